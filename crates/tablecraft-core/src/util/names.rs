//! Name conversions for generated labels.

/// Title-cases a snake_case or kebab-case identifier.
///
/// # Examples
///
/// ```
/// use tablecraft_core::util::names::title_case;
///
/// assert_eq!(title_case("order_details"), "Order Details");
/// assert_eq!(title_case("user-roles"), "User Roles");
/// assert_eq!(title_case("  ID "), "ID");
/// ```
pub fn title_case(name: &str) -> String {
    name.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
