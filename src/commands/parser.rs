/// A prefixed message split into command name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// As typed; matched case-insensitively.
    pub name: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Arguments joined back with single spaces.
    pub fn rest(&self) -> String {
        self.args.join(" ")
    }
}

/// Returns `None` unless `content` starts with `prefix` (case-sensitive)
/// and carries a command name.
pub fn parse(content: &str, prefix: &str) -> Option<Invocation> {
    let body = content.strip_prefix(prefix)?;
    let mut tokens = body.split_whitespace();
    let name = tokens.next()?.to_string();
    Some(Invocation {
        name,
        args: tokens.map(str::to_string).collect(),
    })
}
