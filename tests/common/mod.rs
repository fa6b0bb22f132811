#![allow(dead_code)]

use docstore::{Document, DocumentSchema, FieldKind, FieldSet};
use once_cell::sync::Lazy;

static USER_SCHEMA: Lazy<DocumentSchema> = Lazy::new(|| {
    DocumentSchema::builder("users")
        .attribute("name", FieldKind::Text)
        .attribute("age", FieldKind::Integer)
        .attribute("owner_id", FieldKind::Uuid)
        .index(["name"])
        .index(["age"])
        .build()
        .expect("user schema should be valid")
});

/// Document class shared by the integration tests.
#[derive(Debug)]
pub struct User {
    fields: FieldSet,
}

impl Document for User {
    fn schema() -> &'static DocumentSchema {
        &USER_SCHEMA
    }

    fn from_fields(fields: FieldSet) -> Self {
        Self { fields }
    }

    fn fields(&self) -> &FieldSet {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut FieldSet {
        &mut self.fields
    }
}

impl User {
    pub fn with_name(name: &str) -> Self {
        let mut user = <Self as Document>::new();
        user.fields_mut()
            .set("name", name)
            .expect("name is a declared attribute");
        user
    }

    pub fn name(&self) -> String {
        self.fields
            .value_or_default("name")
            .expect("name is a declared attribute")
            .to_string()
    }
}
