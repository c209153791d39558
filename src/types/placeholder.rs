/// A statement parameter, addressed by name (`:name`) or by 1-based position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Param {
    Named(String),
    Positional(usize),
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Named(value.strip_prefix(':').unwrap_or(value).to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::from(value.as_str())
    }
}

impl From<usize> for Param {
    fn from(value: usize) -> Self {
        Param::Positional(value)
    }
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Param::Named(name) => write!(f, ":{}", name),
            Param::Positional(index) => write!(f, "{}", index),
        }
    }
}

/// Placeholders found in a SQL string.
///
/// Positional placeholders are `?` (numbered in order of appearance) or
/// `$n`. Named placeholders are `:name`. Quoted literals, quoted identifiers,
/// comments and `::` casts are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placeholders {
    /// Highest positional index used.
    pub positional: usize,
    /// Named placeholders, in order of first appearance.
    pub named: Vec<String>,
}

impl Placeholders {
    pub fn parse(sql: &str) -> Self {
        let mut placeholders = Placeholders::default();
        let mut question_marks = 0;
        let mut chars = sql.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '\'' | '"' => {
                    // Doubled quotes inside the literal close and reopen it, which
                    // this loop handles on the next iteration.
                    for (_, next) in chars.by_ref() {
                        if next == c {
                            break;
                        }
                    }
                }
                '-' if matches!(chars.peek(), Some((_, '-'))) => {
                    for (_, next) in chars.by_ref() {
                        if next == '\n' {
                            break;
                        }
                    }
                }
                '/' if matches!(chars.peek(), Some((_, '*'))) => {
                    chars.next();
                    let mut star = false;
                    for (_, next) in chars.by_ref() {
                        if star && next == '/' {
                            break;
                        }
                        star = next == '*';
                    }
                }
                '?' => {
                    question_marks += 1;
                    placeholders.positional = placeholders.positional.max(question_marks);
                }
                '$' => {
                    let digits = take_while(sql, i + 1, |ch| ch.is_ascii_digit());
                    if let Ok(index) = digits.parse::<usize>() {
                        placeholders.positional = placeholders.positional.max(index);
                    }
                    skip(&mut chars, digits.len());
                }
                ':' => {
                    if matches!(chars.peek(), Some((_, ':'))) {
                        chars.next();
                        continue;
                    }
                    let name = take_while(sql, i + 1, |ch| ch.is_ascii_alphanumeric() || ch == '_');
                    if !name.is_empty() && !placeholders.named.iter().any(|n| n == name) {
                        placeholders.named.push(name.to_string());
                    }
                    skip(&mut chars, name.len());
                }
                _ => {}
            }
        }

        placeholders
    }

    /// Returns true if `param` names a placeholder of this statement.
    pub fn accepts(&self, param: &Param) -> bool {
        match param {
            Param::Named(name) => self.named.iter().any(|n| n == name),
            Param::Positional(index) => *index >= 1 && *index <= self.positional,
        }
    }

    /// Total number of distinct placeholders.
    pub fn len(&self) -> usize {
        self.positional + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All placeholders in binding order: positional ascending, then named.
    pub fn params(&self) -> Vec<Param> {
        (1..=self.positional)
            .map(Param::Positional)
            .chain(self.named.iter().cloned().map(Param::Named))
            .collect()
    }
}

fn take_while(sql: &str, start: usize, pred: impl Fn(char) -> bool) -> &str {
    let rest = &sql[start..];
    let end = rest.find(|ch: char| !pred(ch)).unwrap_or(rest.len());
    &rest[..end]
}

fn skip<I: Iterator>(iter: &mut I, n: usize) {
    for _ in 0..n {
        iter.next();
    }
}

/// Builds `n` comma-separated `?` placeholders for an `IN (...)` predicate.
pub fn in_list(n: usize) -> String {
    vec!["?"; n].join(",")
}
