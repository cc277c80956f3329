use serde::Serialize;
use sqlx::FromRow;

/// Authenticated identity. The password hash is never loaded into this struct.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub can_edit_any_work: bool, // blanket "edit any work" permission
    pub is_active: bool,
}

impl User {
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Entry of the `/users` directory.
#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
        }
    }
}

/// `/users/me`.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUserDto {
    #[serde(flatten)]
    pub user: UserDto,
    pub is_admin: bool,
}

impl From<&User> for CurrentUserDto {
    fn from(user: &User) -> Self {
        Self {
            user: UserDto::from(user),
            is_admin: user.can_edit_any_work,
        }
    }
}
