//! Index field selection.

use crate::config::InclusionPolicy;
use crate::schema::CollectionSchema;

/// Ordered field list for one collection's index. The primary key is always first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub collection: String,
    pub fields: Vec<String>,
}

/// Compute the index fields for a collection from its current schema.
///
/// The primary key comes first, followed by the fields the policy selects in
/// schema-declared order. Allow-listed names absent from the schema are ignored.
pub fn build_index_definition(
    schema: &CollectionSchema,
    policy: &InclusionPolicy,
) -> IndexDefinition {
    let mut fields = vec![schema.primary_key.clone()];
    fields.extend(
        schema
            .field_names()
            .filter(|name| *name != schema.primary_key)
            .filter(|name| policy.includes(name))
            .map(String::from),
    );

    IndexDefinition {
        collection: schema.name.clone(),
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, FieldSchema};

    fn bookmarks() -> CollectionSchema {
        CollectionSchema::new(
            "bookmarks",
            vec![
                FieldSchema::text("title"),
                FieldSchema::text("url"),
                FieldSchema::relation("tags", "tags", true),
                FieldSchema::new("visits", FieldKind::Number),
            ],
        )
    }

    #[test]
    fn test_all_fields_in_schema_order() {
        let def = build_index_definition(&bookmarks(), &InclusionPolicy::AllFields);
        assert_eq!(def.collection, "bookmarks");
        assert_eq!(def.fields, vec!["id", "title", "url", "tags", "visits"]);
    }

    #[test]
    fn test_allow_list_keeps_schema_order() {
        let policy = InclusionPolicy::Only {
            fields: vec!["url".into(), "title".into(), "missing".into()],
        };
        let def = build_index_definition(&bookmarks(), &policy);
        assert_eq!(def.fields, vec!["id", "title", "url"]);
    }

    #[test]
    fn test_primary_key_never_duplicated() {
        let policy = InclusionPolicy::Only {
            fields: vec!["id".into(), "url".into()],
        };
        let def = build_index_definition(&bookmarks(), &policy);
        assert_eq!(def.fields, vec!["id", "url"]);
    }

    #[test]
    fn test_primary_key_first_even_when_declared_later() {
        let schema = CollectionSchema {
            name: "notes".into(),
            primary_key: "slug".into(),
            fields: vec![FieldSchema::text("body"), FieldSchema::text("slug")],
        };
        let def = build_index_definition(&schema, &InclusionPolicy::AllFields);
        assert_eq!(def.fields, vec!["slug", "body"]);
    }
}
