use crate::domain_model::Subject;
use std::fmt;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum CodeNamespace {
    Verification,
    PasswordReset,
}

impl CodeNamespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            CodeNamespace::Verification => "verification",
            CodeNamespace::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for CodeNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Addresses one owner's code and its resend counter inside a namespace.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CodeKey {
    pub namespace: CodeNamespace,
    pub owner: Subject,
}

impl CodeKey {
    pub fn new(namespace: CodeNamespace, owner: Subject) -> Self {
        CodeKey { namespace, owner }
    }

    pub fn code_key(&self) -> String {
        format!("{}:{}", self.namespace.prefix(), self.owner)
    }

    pub fn attempts_key(&self) -> String {
        format!("{}_attempts:{}", self.namespace.prefix(), self.owner)
    }
}
