use super::schema::{FieldSet, FieldSpec, FieldType};

pub fn fields() -> FieldSet {
    FieldSet::new(vec![
        FieldSpec::string("username").required(),
        FieldSpec::string("firstName").mutable(),
        FieldSpec::string("lastName").mutable(),
        FieldSpec::new("roles", FieldType::Array(Box::new(FieldType::String))).mutable(),
        FieldSpec::new(
            "preferences",
            FieldType::Object(FieldSet::new(vec![
                FieldSpec::boolean("notifications"),
                FieldSpec::string("theme"),
            ])),
        )
        .mutable(),
    ])
}
