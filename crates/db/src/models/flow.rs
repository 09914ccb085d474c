use super::{
    resource::ResourceKind,
    schema::{FieldSet, FieldSpec},
};

pub fn fields() -> FieldSet {
    FieldSet::new(vec![
        FieldSpec::string("name").mutable().required(),
        FieldSpec::text("description").mutable(),
        FieldSpec::reference("_user", ResourceKind::User),
    ])
}
