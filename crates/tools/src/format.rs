//! Plain-text list rendering for tool output.
//!
//! Every item is wrapped in `**…**` so chat front-ends render it bold.

/// `. **item**` per line.
pub fn format_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| format!(". **{}**", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `N. **item**` per line, numbered from 1.
pub fn format_numbered<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. **{}**", i + 1, item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
