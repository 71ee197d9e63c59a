use serde::Serialize;

/// The authenticated identity attached to a request after token
/// verification. Produced fresh per request, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub uid: String,
    pub email: String,
    pub name: String,
}

/// Response for /auth/verify and /auth/profile
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: Principal,
}

impl UserResponse {
    pub fn new(user: Principal) -> Self {
        Self {
            success: true,
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_response_shape() {
        let resp = UserResponse::new(Principal {
            uid: "uid-1".to_string(),
            email: "a@example.com".to_string(),
            name: "A".to_string(),
        });
        let json = serde_json::to_value(resp).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["user"]["uid"], "uid-1");
        assert_eq!(json["user"]["email"], "a@example.com");
    }
}
