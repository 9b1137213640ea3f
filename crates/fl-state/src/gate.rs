use fl_auth::UserRecord;

/// Screen tree reachable for the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActiveTree {
    /// Dashboard and admin screens
    Privileged,
    /// Login and other unauthenticated screens
    Public,
}

impl std::fmt::Display for ActiveTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Privileged => f.write_str("privileged"),
            Self::Public => f.write_str("public"),
        }
    }
}

/// Pick the navigation tree. Only authenticated admins reach the privileged tree.
pub fn select_active_tree(is_authenticated: bool, user: Option<&UserRecord>) -> ActiveTree {
    match user {
        Some(user) if is_authenticated && user.is_admin() => ActiveTree::Privileged,
        _ => ActiveTree::Public,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_gets_privileged_tree() {
        let admin = UserRecord::new("root", ["admin"]);
        assert_eq!(select_active_tree(true, Some(&admin)), ActiveTree::Privileged);
    }

    #[test]
    fn test_non_admin_gets_public_tree() {
        let student = UserRecord::new("kid", ["student"]);
        assert_eq!(select_active_tree(true, Some(&student)), ActiveTree::Public);
    }

    #[test]
    fn test_unauthenticated_gets_public_tree() {
        let admin = UserRecord::new("root", ["admin", "teacher"]);
        assert_eq!(select_active_tree(false, None), ActiveTree::Public);
        assert_eq!(select_active_tree(false, Some(&admin)), ActiveTree::Public);
    }
}
