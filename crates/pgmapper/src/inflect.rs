//! Entity naming derived from table names.
//!
//! `blog_posts` gives the entity name `BlogPost`, the singular name `blogPost`
//! and the plural name `blogPosts`. Only the last `_`-separated word is
//! singularized.

use heck::{ToLowerCamelCase, ToUpperCamelCase};

const IRREGULAR: &[(&str, &str)] = &[
    ("people", "person"),
    ("children", "child"),
    ("men", "man"),
    ("women", "woman"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("geese", "goose"),
    ("mice", "mouse"),
    ("movies", "movie"),
    ("indices", "index"),
];

const UNCOUNTABLE: &[&str] = &[
    "data",
    "equipment",
    "fish",
    "information",
    "metadata",
    "money",
    "news",
    "series",
    "sheep",
    "species",
];

fn singular_word(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((_, singular)) = IRREGULAR.iter().find(|(plural, _)| *plural == lower) {
        return (*singular).to_string();
    }
    if lower.len() > 3 && lower.ends_with("ies") {
        return format!("{}y", &word[..word.len() - 3]);
    }
    if ["sses", "shes", "ches", "xes", "zzes"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        return word[..word.len() - 2].to_string();
    }
    if lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is") {
        return word.to_string();
    }
    match word.strip_suffix(['s', 'S']) {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

/// Singularize the last word of a snake_case name.
pub fn singularize(name: &str) -> String {
    match name.rsplit_once('_') {
        Some((head, last)) => format!("{head}_{}", singular_word(last)),
        None => singular_word(name),
    }
}

/// `pages` -> `Page`
pub fn entity_name(table: &str) -> String {
    singularize(table).to_upper_camel_case()
}

/// `blog_posts` -> `blogPost`
pub fn singular_name(table: &str) -> String {
    singularize(table).to_lower_camel_case()
}

/// `blog_posts` -> `blogPosts`
pub fn plural_name(table: &str) -> String {
    table.to_lower_camel_case()
}
