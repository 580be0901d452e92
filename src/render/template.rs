//! HTML preview template substitution

/// Values substituted into the preview template
pub struct TemplateValues<'a> {
    pub format: &'a str,
    pub image: &'a str,
    pub class: &'a str,
}

/// Replace every `{format}`, `{image}` and `{class}` token in one pass.
///
/// Substituted text is never rescanned, so tokens inside the values stay
/// untouched. Any other `{...}` sequence is copied verbatim.
pub fn fill(template: &str, values: &TemplateValues<'_>) -> String {
    let mut out = String::with_capacity(template.len() + values.image.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let replacement = [
            ("{format}", values.format),
            ("{image}", values.image),
            ("{class}", values.class),
        ]
        .into_iter()
        .find(|(token, _)| candidate.starts_with(token));

        if let Some((token, value)) = replacement {
            out.push_str(value);
            rest = &candidate[token.len()..];
        } else {
            out.push('{');
            rest = &candidate[1..];
        }
    }
    out.push_str(rest);
    out
}
