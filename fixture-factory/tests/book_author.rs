//! Factories that depend on each other through the test context

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fixture_factory::{
    field, Attributes, Context, Dependencies, Factory, FactoryError, FactoryOptions, Produced,
    Schema,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Author {
    id: u64,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Book {
    id: u64,
    title: String,
    author_id: u64,
}

fn next_id() -> impl Fn() -> u64 + Send + Sync + 'static {
    let counter = Arc::new(AtomicU64::new(1));
    move || counter.fetch_add(1, Ordering::SeqCst)
}

fn author_factory() -> Factory<Author> {
    Factory::new("Author")
        .unwrap()
        .with_schema(
            Schema::builder()
                .field("id", field::<u64>().default_with(next_id()))
                .field("name", field::<String>())
                .build()
                .unwrap(),
        )
        .with_value(|attrs| async move { Ok(Produced::new(attrs.parse::<Author>()?)) })
}

fn book_factory() -> Factory<Book> {
    Factory::new("Book")
        .unwrap()
        .with_schema(
            Schema::builder()
                .field(
                    "authorId",
                    field::<u64>()
                        .maybe_from(["author"], |ctx| ctx.get::<Author>("author").map(|a| a.id)),
                )
                .field("id", field::<u64>().default_with(next_id()))
                .field("title", field::<String>().default("Unknown".to_string()))
                .build()
                .unwrap(),
        )
        .with_value(|attrs| async move { Ok(Produced::new(attrs.parse::<Book>()?)) })
}

fn destroy() -> FactoryOptions {
    FactoryOptions::new(true)
}

#[test]
fn test_book_declares_author_dependency() {
    assert_eq!(book_factory().dependencies(), vec!["author"]);
    assert!(author_factory().dependencies().is_empty());

    let fixture = book_factory().use_value(Attributes::new(), destroy()).unwrap();
    assert_eq!(fixture.dependencies(), vec!["author"]);
}

#[test_log::test(tokio::test)]
async fn test_book_uses_author_from_context() {
    let author_fixture = author_factory()
        .use_value(Attributes::new().with("name", "A. Nonymous"), destroy())
        .unwrap();
    let book_fixture = book_factory().use_value(Attributes::new(), destroy()).unwrap();

    author_fixture
        .run(&Context::new(), |author| async move {
            assert_eq!(author.name, "A. Nonymous");
            let context = Context::new().with_serialized("author", &author).unwrap();

            let book = book_fixture
                .run(&context, |book| async move { book })
                .await
                .unwrap();
            assert_eq!(book.title, "Unknown");
            assert_eq!(book.author_id, author.id);
        })
        .await
        .unwrap();
}

#[test_log::test(tokio::test)]
async fn test_create_book_with_explicit_author_id() {
    let authors = author_factory().use_create_value(None, destroy()).unwrap();
    let books = book_factory().use_create_value(None, destroy()).unwrap();

    authors
        .run(&Context::new(), |create_author| async move {
            let author = create_author
                .create(Attributes::new().with("name", "D. Adams"))
                .await
                .unwrap();

            books
                .run(&Context::new(), |create_book| async move {
                    let book = create_book
                        .create(
                            Attributes::new()
                                .with("title", "The Book")
                                .with("authorId", author.id),
                        )
                        .await
                        .unwrap();
                    assert_eq!(book.title, "The Book");
                    assert_eq!(book.author_id, author.id);
                })
                .await
                .unwrap();
        })
        .await
        .unwrap();
}

#[test_log::test(tokio::test)]
async fn test_create_book_without_author_fails() {
    let books = book_factory().use_create_value(None, destroy()).unwrap();

    let err = books
        .run(&Context::new(), |create| async move {
            create
                .create(Attributes::new().with("title", "The Book"))
                .await
                .unwrap_err()
        })
        .await
        .unwrap();

    assert_eq!(
        err.to_string(),
        "[Book] 1 required field(s) have undefined values:\n\
         - authorId: must be provided as an attribute or via the test context (author)"
    );
    assert!(matches!(err, FactoryError::UndefinedFields(_)));
}

#[test_log::test(tokio::test)]
async fn test_create_author_with_undefined_name_fails() {
    let authors = author_factory().use_create_value(None, destroy()).unwrap();

    let err = authors
        .run(&Context::new(), |create| async move {
            create
                .create(Attributes::new().with("name", serde_json::Value::Null))
                .await
                .unwrap_err()
        })
        .await
        .unwrap();

    assert_eq!(
        err.to_string(),
        "[Author] 1 required field(s) have undefined values:\n\
         - name: must be provided as an attribute"
    );
}

#[test_log::test(tokio::test)]
async fn test_use_value_fails_before_body_without_author() {
    let book_fixture = book_factory().use_value(Attributes::new(), destroy()).unwrap();

    let err = book_fixture
        .run(&Context::new(), |_book| async move {
            unreachable!("body must not run when validation fails");
        })
        .await
        .unwrap_err();

    assert_eq!(
        err.missing_fields()
            .map(|fields| fields.iter().map(|f| f.key.clone()).collect::<Vec<_>>()),
        Some(vec!["authorId".to_string()])
    );
}
