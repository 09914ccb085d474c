use super::{
    resource::ResourceKind,
    schema::{FieldSet, FieldSpec},
};

/// Notes are comments left on a task; author names are denormalised so a
/// note list renders without fetching users.
pub fn fields() -> FieldSet {
    FieldSet::new(vec![
        FieldSpec::text("name").mutable().required(),
        FieldSpec::reference("_task", ResourceKind::Task),
        FieldSpec::reference("_flow", ResourceKind::Flow),
        FieldSpec::reference("_user", ResourceKind::User),
        FieldSpec::string("_userFirstName"),
        FieldSpec::string("_userLastName"),
    ])
}
