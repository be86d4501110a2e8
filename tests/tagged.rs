use facet::Facet;
use facet_core::{Type, UserType};

#[derive(Facet, Clone, Debug, Default, PartialEq)]
struct Account {
    #[facet(api = "user_name")]
    name: String,
    email: String,
}

#[test]
fn tagged_fields_match_by_tag_value() {
    #[derive(Facet, Clone, Debug)]
    struct Login {
        #[facet(api = "user_name")]
        login: String,
        name: String,
        email: String,
    }

    let login = Login {
        login: "ada_l".to_string(),
        name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
    };
    let mut account = Account::default();
    facet_copy::copy_with_tag(&mut account, &login, "api").unwrap();

    assert_eq!(account.name, "ada_l");
    assert_eq!(account.email, "ada@example.com");
}

#[test]
fn untagged_same_name_is_not_matched_in_tagged_mode() {
    #[derive(Facet, Clone, Debug)]
    struct Plain {
        name: String,
    }

    let mut account = Account {
        name: "kept".to_string(),
        email: String::new(),
    };
    facet_copy::copy_with_tag(
        &mut account,
        &Plain {
            name: "ignored".to_string(),
        },
        "api",
    )
    .unwrap();

    assert_eq!(account.name, "kept");
}

#[test]
fn tags_are_ignored_without_a_tag_key() {
    #[derive(Facet, Clone, Debug)]
    struct Plain {
        name: String,
    }

    let mut account = Account::default();
    facet_copy::copy(
        &mut account,
        &Plain {
            name: "by name".to_string(),
        },
    )
    .unwrap();
    assert_eq!(account.name, "by name");

    let mut account = Account::default();
    facet_copy::copy_with_tag(
        &mut account,
        &Plain {
            name: "empty tag".to_string(),
        },
        "",
    )
    .unwrap();
    assert_eq!(account.name, "empty tag");
}

#[test]
fn other_tag_keys_fall_back_to_field_names() {
    #[derive(Facet, Clone, Debug)]
    struct Row {
        #[facet(db = "mail")]
        email: String,
    }

    let mut account = Account::default();
    facet_copy::copy_with_tag(
        &mut account,
        &Row {
            email: "grace@example.com".to_string(),
        },
        "api",
    )
    .unwrap();

    assert_eq!(account.email, "grace@example.com");
}

#[test]
fn resolve_tag_name_reads_the_attribute() {
    let Type::User(UserType::Struct(struct_type)) = Account::SHAPE.ty else {
        panic!("Account should be a struct");
    };
    let name = &struct_type.fields[0];
    let email = &struct_type.fields[1];

    assert_eq!(facet_copy::resolve_tag_name(name, "api"), "user_name");
    assert_eq!(facet_copy::resolve_tag_name(name, ""), "name");
    assert_eq!(facet_copy::resolve_tag_name(name, "json"), "name");
    assert_eq!(facet_copy::resolve_tag_name(email, "api"), "email");

    let fields = facet_copy::fields_of(Account::SHAPE);
    assert_eq!(fields[0].tag("api"), Some("user_name"));
    assert_eq!(fields[0].match_name("api"), "user_name");
    assert_eq!(fields[1].tag("api"), None);
}

#[test]
fn colliding_tags_resolve_to_the_last_declared_field() {
    #[derive(Facet, Clone, Debug, Default, PartialEq)]
    struct Profile {
        #[facet(api = "handle")]
        nickname: String,
        #[facet(api = "handle")]
        display_name: String,
    }

    #[derive(Facet, Clone, Debug)]
    struct Signup {
        #[facet(api = "handle")]
        login: String,
    }

    let mut profile = Profile {
        nickname: "kept".to_string(),
        display_name: String::new(),
    };
    facet_copy::copy_with_tag(
        &mut profile,
        &Signup {
            login: "hopper".to_string(),
        },
        "api",
    )
    .unwrap();

    assert_eq!(
        profile,
        Profile {
            nickname: "kept".to_string(),
            display_name: "hopper".to_string(),
        }
    );
}
