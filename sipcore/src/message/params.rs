use std::fmt;

/// A generic `name[=value]` parameter, as found on URIs and header values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Param {
    pub name: String,
    pub value: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Param {
            name: name.into(),
            value: value.map(Into::into),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}={}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An ordered collection of [`Param`]s, preserving insertion (wire) order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params(Vec<Param>);

impl Params {
    pub fn new() -> Self {
        Params(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `Some(value)` if present; `Some(None)` means the parameter
    /// was present with no value (e.g. bare `;lr`).
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.0
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn push(&mut self, param: Param) {
        self.0.push(param)
    }

    /// Replaces the value of the first param named `name`, or appends a new
    /// one if absent. Use instead of `push` for params that must stay
    /// unique (e.g. `received`, `rport`) so re-applying doesn't duplicate them.
    pub fn set(&mut self, name: impl Into<String>, value: Option<impl Into<String>>) {
        let name = name.into();
        let value = value.map(Into::into);
        match self.0.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&name)) {
            Some(p) => p.value = value,
            None => self.0.push(Param { name, value }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.0 {
            write!(f, ";{p}")?;
        }
        Ok(())
    }
}

impl<const N: usize> From<[(&str, Option<&str>); N]> for Params {
    fn from(params: [(&str, Option<&str>); N]) -> Self {
        Params(params.into_iter().map(|(n, v)| Param::new(n, v)).collect())
    }
}
