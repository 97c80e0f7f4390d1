mod common;

use cmsmig_core::content::{
    BaseType, ContentNode, FieldTypeDefinition, SchemaField, SchemaType, StorageKind,
};
use cmsmig_core::mapping::{ContentSource, ContentsByTypeSource};
use cmsmig_core::migration::{FieldTransformMigration, MigrationUnit};
use common::TestContext;
use pretty_assertions::assert_eq;
use uuid::Uuid;

fn site() -> TestContext {
    let tc = TestContext::new();
    tc.repo.add_field_type(FieldTypeDefinition::new(
        1,
        "Canonical Page",
        "Umbraco.ContentPickerAlias",
        StorageKind::Integer,
    ));
    tc.repo.add_field_type(FieldTypeDefinition::new(
        2,
        "Author",
        "Umbraco.MemberPicker",
        StorageKind::Integer,
    ));
    tc.repo.add_schema_type(
        BaseType::Document,
        SchemaType::new(10, "seo").with_field(SchemaField::new("canonical", 1)),
    );
    tc.repo.add_schema_type(
        BaseType::Document,
        SchemaType::new(11, "article")
            .with_composition(10)
            .with_field(SchemaField::new("author", 2)),
    );
    tc.repo.add_schema_type(BaseType::Document, SchemaType::new(12, "news").with_parent(11));
    tc.repo.add_schema_type(BaseType::Document, SchemaType::new(20, "plain"));
    tc.repo.add_schema_type(BaseType::Member, SchemaType::new(30, "member"));

    tc.add_document(5, 20, "plain");
    tc.repo
        .add_node(ContentNode::new(7, Uuid::new_v4(), BaseType::Member, 30, "member"));
    tc.repo.add_node(
        ContentNode::new(100, Uuid::new_v4(), BaseType::Document, 12, "news")
            .with_value("canonical", "5")
            .with_value("author", "7"),
    );
    tc.repo.add_node(
        ContentNode::new(101, Uuid::new_v4(), BaseType::Document, 11, "article")
            .with_value("canonical", "5")
            .with_value("author", "7"),
    );
    tc
}

#[test]
fn test_discovery_rewrites_inherited_fields() {
    let tc = site();
    FieldTransformMigration::discovery().up(&tc.ctx()).unwrap();

    let page = tc.reference(BaseType::Document, 5);
    let member = tc.reference(BaseType::Member, 7);
    for id in [100, 101] {
        assert_eq!(tc.value(BaseType::Document, id, "canonical"), Some(page.clone()));
        assert_eq!(tc.value(BaseType::Document, id, "author"), Some(member.clone()));
    }

    let picker = tc.repo.field_type_by_id(1).unwrap();
    assert_eq!(picker.editor_alias, "Umbraco.ContentPicker2");
    assert_eq!(picker.storage, StorageKind::Ntext);
}

#[test]
fn test_failed_definition_write_leaves_its_content() {
    let tc = site();
    tc.repo.fail_field_type_save(2);

    FieldTransformMigration::discovery().up(&tc.ctx()).unwrap();

    assert_eq!(
        tc.value(BaseType::Document, 100, "canonical"),
        Some(tc.reference(BaseType::Document, 5))
    );
    assert_eq!(tc.value(BaseType::Document, 100, "author").as_deref(), Some("7"));
    assert_eq!(tc.value(BaseType::Document, 101, "author").as_deref(), Some("7"));
    assert_eq!(tc.repo.field_type_by_id(2).unwrap().editor_alias, "Umbraco.MemberPicker");
}

#[test]
fn test_excluded_definition_is_left_alone() {
    let tc = site();
    FieldTransformMigration::discovery()
        .with_exclude(["author"])
        .up(&tc.ctx())
        .unwrap();

    assert_eq!(tc.value(BaseType::Document, 100, "author").as_deref(), Some("7"));
    assert_eq!(tc.repo.field_type_saves(), vec![1]);
}

#[test]
fn test_source_covers_descendants_once() {
    let tc = TestContext::new();
    tc.repo.add_schema_type(BaseType::Document, SchemaType::new(1, "a"));
    tc.repo
        .add_schema_type(BaseType::Document, SchemaType::new(2, "b").with_parent(1).with_composition(1));
    tc.repo.add_schema_type(BaseType::Document, SchemaType::new(3, "c").with_composition(2));
    tc.repo.add_schema_type(BaseType::Document, SchemaType::new(4, "other"));
    tc.add_document(10, 1, "a");
    tc.add_document(20, 2, "b");
    tc.add_document(30, 3, "c");
    tc.add_document(40, 4, "other");

    let source = ContentsByTypeSource::new(BaseType::Document, "a");
    let mut ids: Vec<i64> = source
        .contents(&tc.repo)
        .map(|n| n.unwrap().id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec![10, 20, 30]);
}
