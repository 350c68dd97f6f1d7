use crate::PublicProfile;

pub const WRAP_COLUMNS: usize = 60;
const BIO_CONTINUATION: &str = "│     ";

pub fn render_plain_text(profile: &PublicProfile, public_host: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("┌─ {} (@{})\n", profile.full_name, profile.handle));
    out.push_str("│\n");

    if !profile.bio.trim().is_empty() {
        out.push_str("├─ About:\n");
        out.push_str("│  ├─ ");
        let lines = wrap_words(&profile.bio, WRAP_COLUMNS);
        out.push_str(&lines.join(&format!("\n{BIO_CONTINUATION}")));
        out.push('\n');
        out.push_str("│\n");
    }

    if !profile.links.is_empty() {
        out.push_str("├─ Links\n");
        let last = profile.links.len() - 1;
        for (index, link) in profile.links.iter().enumerate() {
            let branch = if index == last { "└─" } else { "├─" };
            out.push_str(&format!("│  {branch} 🔗 {}: {}\n", link.name, link.url));
        }
        out.push_str("│\n");
    }

    out.push_str(&format!("└─ Powered by {public_host}\n"));
    out
}

pub fn render_json(profile: &PublicProfile) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(profile)
}

/// Greedy word wrap. A single word longer than `width` gets its own line.
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        if current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
