//! Closing-body-tag script injection
//!
//! Every integration delivers the client program through this one
//! function, so the bytes injected never depend on the host lifecycle.

const BODY_CLOSE: &str = "</body>";

/// Outcome of one injection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injection {
    /// The script was inserted before the first `</body>`
    Injected,
    /// The document has no `</body>`; left unchanged
    NoBodyTag,
    /// The document already carries this exact script; left unchanged
    AlreadyPresent,
}

impl Injection {
    pub fn is_injected(&self) -> bool {
        matches!(self, Injection::Injected)
    }
}

/// Wrap the client program in a script element
pub fn script_tag(script: &str) -> String {
    format!("<script>{}</script>", script)
}

/// Insert `<script>{script}</script>` before the first `</body>`
pub fn inject_script(html: &str, script: &str) -> (String, Injection) {
    let tag = script_tag(script);
    if html.contains(&tag) {
        return (html.to_string(), Injection::AlreadyPresent);
    }
    if !html.contains(BODY_CLOSE) {
        return (html.to_string(), Injection::NoBodyTag);
    }
    let injected = html.replacen(BODY_CLOSE, &format!("{}{}", tag, BODY_CLOSE), 1);
    (injected, Injection::Injected)
}
