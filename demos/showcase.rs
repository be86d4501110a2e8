//! Showcase of facet-copy
//!
//! Copies values between unrelated types that share field names: entities
//! into views, records into lists, and tagged fields into API models.
//!
//! Run with: cargo run --example showcase

use facet::Facet;
use facet_copy::Mapper;

#[derive(Facet, Clone, Debug)]
struct Timestamps {
    created_at: u64,
    updated_at: u64,
}

#[derive(Facet, Clone, Debug)]
struct UserEntity {
    id: u64,
    #[facet(api = "user_name")]
    login: String,
    first: String,
    last: String,
    password_hash: String,
    age: Option<u32>,
    #[facet(flatten)]
    timestamps: Timestamps,
}

#[derive(Facet, Clone, Debug, Default)]
struct UserView {
    id: u64,
    full_name: String,
    age: Option<u8>,
    updated_at: u64,
}

#[derive(Facet, Clone, Debug, Default)]
struct ApiUser {
    #[facet(api = "user_name")]
    name: String,
    created_at: u64,
}

fn users() -> Vec<UserEntity> {
    vec![
        UserEntity {
            id: 1,
            login: "ada".to_string(),
            first: "Ada".to_string(),
            last: "Lovelace".to_string(),
            password_hash: "x".to_string(),
            age: Some(36),
            timestamps: Timestamps {
                created_at: 1_700_000_000,
                updated_at: 1_700_000_500,
            },
        },
        UserEntity {
            id: 2,
            login: "grace".to_string(),
            first: "Grace".to_string(),
            last: "Hopper".to_string(),
            password_hash: "y".to_string(),
            age: None,
            timestamps: Timestamps {
                created_at: 1_700_001_000,
                updated_at: 1_700_001_000,
            },
        },
    ]
}

fn section(title: &str) {
    println!("\n{}", "─".repeat(60));
    println!("  {title}");
    println!("{}", "─".repeat(60));
}

fn main() -> Result<(), facet_copy::CopyError> {
    let users = users();

    section("Entity into view, with a computed field");
    let mapper = Mapper::new().provide("full_name", |user: &UserEntity| {
        format!("{} {}", user.first, user.last)
    });
    let mut view = UserView::default();
    mapper.copy(&mut view, &users[0])?;
    println!("{view:#?}");

    section("Entities appended to a list of views");
    let mut views: Vec<UserView> = Vec::new();
    mapper.copy(&mut views, &users)?;
    for view in &views {
        println!("  {} {:<16} age={:?}", view.id, view.full_name, view.age);
    }

    section("Matching by the `api` tag");
    let mut api_user = ApiUser::default();
    facet_copy::copy_with_tag(&mut api_user, &users[1], "api")?;
    println!("{api_user:#?}");

    section("Fields of UserEntity, as seen by the copier");
    for field in facet_copy::fields_of(UserEntity::SHAPE) {
        println!(
            "  {:<14} path={:?} match={}",
            field.name,
            field.path,
            field.match_name("api")
        );
    }

    Ok(())
}
