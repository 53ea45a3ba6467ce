//! SURT form of URIs
//!
//! Sort-friendly URI form: the authority is wrapped in parentheses with
//! host labels reversed, each followed by a comma, and the whole result
//! lowercased:
//!
//! ```text
//! http://www.archive.org/a/b  →  http://(org,archive,www,)/a/b
//! http://u:p@1.2.3.4:8080/x   →  http://(1.2.3.4:8080@u:p)/x
//! ```
//!
//! Strings without a `scheme://` authority (or containing whitespace) are
//! returned unchanged.

/// Convert a URI to SURT form
pub fn surt_from_uri(uri: &str) -> String {
    match split(uri) {
        Some(parts) => parts.render().to_lowercase(),
        None => uri.to_string(),
    }
}

struct SurtParts<'a> {
    scheme: &'a str,
    userinfo: Option<&'a str>,
    host: &'a str,
    port: &'a str,
    path: &'a str,
}

impl SurtParts<'_> {
    fn render(&self) -> String {
        let mut out =
            String::with_capacity(self.scheme.len() + self.host.len() + self.path.len() + 8);
        out.push_str(self.scheme);
        out.push('(');
        if is_dotted_quad(self.host) {
            out.push_str(self.host);
        } else {
            for label in self.host.split('.').rev() {
                out.push_str(label);
                out.push(',');
            }
        }
        out.push_str(self.port);
        if let Some(userinfo) = self.userinfo {
            out.push('@');
            out.push_str(userinfo);
        }
        out.push(')');
        out.push_str(self.path);
        out
    }
}

fn split(uri: &str) -> Option<SurtParts<'_>> {
    if uri.is_empty() || uri.chars().any(char::is_whitespace) {
        return None;
    }
    let scheme_end = uri.find("://")?;
    let scheme_name = &uri[..scheme_end];
    if scheme_name.is_empty() || !scheme_name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let scheme = &uri[..scheme_end + 3];
    let rest = &uri[scheme_end + 3..];

    let mut userinfo = None;
    let mut authority_start = 0;
    if let Some(at) = rest.find('@') {
        let candidate = &rest[..at];
        if !candidate.is_empty() && candidate.chars().all(is_userinfo_char) {
            userinfo = Some(candidate);
            authority_start = at + 1;
        }
    }
    let rest = &rest[authority_start..];

    let (authority, path) = match rest.find('/') {
        Some(0) | None => (rest, ""),
        Some(slash) => rest.split_at(slash),
    };
    if authority.is_empty() {
        return None;
    }

    let (host, port) = match authority.rfind(':') {
        Some(colon)
            if colon > 0
                && colon + 1 < authority.len()
                && authority[colon + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            authority.split_at(colon)
        }
        _ => (authority, ""),
    };

    Some(SurtParts {
        scheme,
        userinfo,
        host,
        port,
        path,
    })
}

fn is_userinfo_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || "-.!~*'()%;:&=+$,".contains(c)
}

fn is_dotted_quad(host: &str) -> bool {
    let parts: Vec<&str> = host.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| (1..=3).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit()))
}
