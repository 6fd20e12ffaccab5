//! Caller identity.

/// Who is making a request, as resolved by the auth collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Option<String>,
    /// Company the user acts for, if any.
    pub company_id: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            company_id: None,
        }
    }

    pub fn company(user_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            company_id: Some(company_id.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}
