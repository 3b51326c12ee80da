use std::fmt;

/// Errors collected from steps that were attempted independently of each
/// other.
#[derive(Debug)]
pub struct IndividualErrorList {
    list: Vec<anyhow::Error>,
}

impl IndividualErrorList {
    pub fn is_empty(&self) -> bool { self.list.is_empty() }

    pub fn len(&self) -> usize { self.list.len() }

    pub fn push(&mut self, err: anyhow::Error) { self.list.push(err); }

    /// `Ok` when nothing was collected.
    pub fn into_result(self) -> Result<(), Self> {
        if self.list.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for IndividualErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> =
            self.list.iter().map(|err| format!("{:#}", err)).collect();
        write!(f, "{} error(s): [{}]", self.list.len(), messages.join("; "))
    }
}

impl std::error::Error for IndividualErrorList {}

impl From<Vec<anyhow::Error>> for IndividualErrorList {
    fn from(list: Vec<anyhow::Error>) -> Self { IndividualErrorList { list } }
}

impl Default for IndividualErrorList {
    fn default() -> Self { Vec::new().into() }
}
