//! `{{path}}` interpolation for alert message templates.
//!
//! Placeholders resolve against the same [`FactContext`] the conditions were
//! evaluated with. A placeholder whose path is invalid, absent or null is
//! left in the output exactly as written.

use crate::context::FactContext;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Replace every resolvable `{{path}}` in `template`.
pub fn interpolate(template: &str, ctx: &FactContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            // Unterminated placeholder: copy the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };
        let placeholder = &rest[start..start + OPEN.len() + end + CLOSE.len()];
        match ctx.lookup(after_open[..end].trim()).render() {
            Some(rendered) => out.push_str(&rendered),
            None => out.push_str(placeholder),
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}
