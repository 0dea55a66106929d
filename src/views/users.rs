//! User account viewset.
//!
//! Staff manage every account; other users only see and edit their own.
//! Passwords are write-only.

use std::sync::Arc;

use serde_json::Value;

use crate::auth::users::{NewUser, User, UserChanges};
use crate::auth::{AuthState, Identity};
use crate::http::response::{ApiError, ApiResult, FieldErrors};
use crate::views::model::{into_object, parse_pk};
use crate::views::store::Object;
use crate::views::{Permission, ViewRequest, ViewSet};

#[derive(Debug, Clone)]
pub struct UserViewSet {
    auth: Arc<AuthState>,
}

impl UserViewSet {
    pub fn new(auth: Arc<AuthState>) -> Self {
        Self { auth }
    }

    /// The target account, if the caller may see it.
    fn visible(&self, req: &ViewRequest<'_>, pk: &str) -> ApiResult<User> {
        let id = parse_pk(pk)?;
        let caller = req.identity.ok_or(ApiError::NotAuthenticated)?;
        if !caller.is_staff && caller.user_id != id {
            return Err(ApiError::NotFound);
        }
        self.auth.users.get(id).ok_or(ApiError::NotFound)
    }

    /// Changes requested by `fields` against the `current` account, if any.
    ///
    /// Flags resent with their current value are dropped, so non-staff callers
    /// can PUT their own record back unchanged.
    fn changes(
        &self,
        caller: &Identity,
        current: Option<&User>,
        fields: &Object,
    ) -> ApiResult<UserChanges> {
        let mut errors = FieldErrors::new();
        let mut changes = UserChanges {
            email: string_field(fields, "email", &mut errors),
            first_name: string_field(fields, "first_name", &mut errors),
            last_name: string_field(fields, "last_name", &mut errors),
            password: string_field(fields, "password", &mut errors),
            is_staff: bool_field(fields, "is_staff", &mut errors),
            is_active: bool_field(fields, "is_active", &mut errors),
        };
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }
        if let Some(user) = current {
            changes.is_staff = changes.is_staff.filter(|&flag| flag != user.is_staff);
            changes.is_active = changes.is_active.filter(|&flag| flag != user.is_active);
        }
        if !caller.is_staff && (changes.is_staff.is_some() || changes.is_active.is_some()) {
            return Err(ApiError::PermissionDenied);
        }
        Ok(changes)
    }

    fn apply(&self, req: &ViewRequest<'_>, pk: &str, data: Value, partial: bool) -> ApiResult<Value> {
        let caller = req.identity.ok_or(ApiError::NotAuthenticated)?;
        let user = self.visible(req, pk)?;
        let fields = into_object(data)?;

        if !partial && fields.get("username").and_then(Value::as_str).is_none() {
            return Err(ApiError::field("username", "This field is required."));
        }
        if let Some(username) = fields.get("username").and_then(Value::as_str) {
            if username != user.username {
                return Err(ApiError::field("username", "Username cannot be changed."));
            }
        }

        let changes = self.changes(caller, Some(&user), &fields)?;
        let updated = self.auth.users.update(user.id, changes)?.ok_or(ApiError::NotFound)?;
        render(&updated)
    }
}

fn string_field(fields: &Object, name: &str, errors: &mut FieldErrors) -> Option<String> {
    match fields.get(name)? {
        Value::String(s) => Some(s.clone()),
        _ => {
            errors.insert(name.to_string(), vec!["Not a valid string.".into()]);
            None
        }
    }
}

fn bool_field(fields: &Object, name: &str, errors: &mut FieldErrors) -> Option<bool> {
    match fields.get(name)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => {
            errors.insert(name.to_string(), vec!["Must be a valid boolean.".into()]);
            None
        }
    }
}

fn render(user: &User) -> ApiResult<Value> {
    serde_json::to_value(user).map_err(|e| ApiError::Internal(e.to_string()))
}

impl ViewSet for UserViewSet {
    fn model_name(&self) -> &str {
        "OTIUser"
    }

    fn description(&self) -> &str {
        "Application user accounts."
    }

    fn permission(&self) -> Permission {
        Permission::IsAuthenticated
    }

    fn list(&self, req: &ViewRequest<'_>) -> ApiResult<Value> {
        let caller = req.identity.ok_or(ApiError::NotAuthenticated)?;
        let users = self
            .auth
            .users
            .list()
            .iter()
            .filter(|u| caller.is_staff || u.id == caller.user_id)
            .map(render)
            .collect::<ApiResult<Vec<_>>>()?;
        Ok(Value::Array(users))
    }

    fn create(&self, req: &ViewRequest<'_>, data: Value) -> ApiResult<Value> {
        let caller = req.identity.ok_or(ApiError::NotAuthenticated)?;
        if !caller.is_staff {
            return Err(ApiError::PermissionDenied);
        }
        let fields = into_object(data)?;

        let mut errors = FieldErrors::new();
        let username = string_field(&fields, "username", &mut errors);
        let password = string_field(&fields, "password", &mut errors);
        for (name, value) in [("username", &username), ("password", &password)] {
            if value.as_deref().map_or(true, str::is_empty) && !errors.contains_key(name) {
                errors.insert(name.to_string(), vec!["This field is required.".into()]);
            }
        }
        let (Some(username), Some(password), true) = (username, password, errors.is_empty()) else {
            return Err(ApiError::Validation(errors));
        };
        let changes = self.changes(caller, None, &fields)?;

        let user = self.auth.users.create(NewUser {
            username,
            password,
            email: changes.email.unwrap_or_default(),
            first_name: changes.first_name.unwrap_or_default(),
            last_name: changes.last_name.unwrap_or_default(),
            is_staff: changes.is_staff.unwrap_or(false),
        })?;
        render(&user)
    }

    fn retrieve(&self, req: &ViewRequest<'_>, pk: &str) -> ApiResult<Value> {
        render(&self.visible(req, pk)?)
    }

    fn update(&self, req: &ViewRequest<'_>, pk: &str, data: Value) -> ApiResult<Value> {
        self.apply(req, pk, data, false)
    }

    fn partial_update(&self, req: &ViewRequest<'_>, pk: &str, data: Value) -> ApiResult<Value> {
        self.apply(req, pk, data, true)
    }

    fn destroy(&self, req: &ViewRequest<'_>, pk: &str) -> ApiResult<()> {
        let caller = req.identity.ok_or(ApiError::NotAuthenticated)?;
        if !caller.is_staff {
            return Err(ApiError::PermissionDenied);
        }
        let user = self
            .auth
            .users
            .remove(parse_pk(pk)?)
            .ok_or(ApiError::NotFound)?;
        self.auth.forget_user(user.id);
        tracing::info!(user_id = user.id, username = %user.username, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::users::UserStore;
    use crate::auth::AuthScheme;
    use crate::config::AuthConfig;
    use serde_json::json;

    fn setup() -> (UserViewSet, Identity) {
        let config = AuthConfig {
            admin_password: "pw".into(),
            ..Default::default()
        };
        let auth = Arc::new(AuthState::from_config(&config, Arc::new(UserStore::new())).unwrap());
        let admin = auth.users.find_by_username("admin").unwrap();
        (
            UserViewSet::new(auth),
            Identity::from_user(&admin, AuthScheme::Token),
        )
    }

    fn as_user(identity: &Identity) -> ViewRequest<'_> {
        ViewRequest {
            identity: Some(identity),
            query: Default::default(),
        }
    }

    #[test]
    fn test_staff_creates_users_without_exposing_password() {
        let (viewset, admin) = setup();
        let created = viewset
            .create(
                &as_user(&admin),
                json!({ "username": "planner", "password": "pw", "email": "p@example.org" }),
            )
            .unwrap();
        assert_eq!(created["username"], "planner");
        assert_eq!(created["is_staff"], false);
        assert!(created.get("password").is_none());
        assert!(created.get("password_hash").is_none());
    }

    #[test]
    fn test_create_validation() {
        let (viewset, admin) = setup();
        let err = viewset
            .create(&as_user(&admin), json!({ "username": 3 }))
            .unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                assert_eq!(errors["username"], vec!["Not a valid string."]);
                assert_eq!(errors["password"], vec!["This field is required."]);
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = viewset
            .create(&as_user(&admin), json!({ "username": "admin", "password": "x" }))
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref e) if e.contains_key("username")));
    }

    #[test]
    fn test_non_staff_sees_only_self() {
        let (viewset, admin) = setup();
        let created = viewset
            .create(&as_user(&admin), json!({ "username": "planner", "password": "pw" }))
            .unwrap();
        let planner = Identity {
            user_id: created["id"].as_u64().unwrap(),
            username: "planner".into(),
            is_staff: false,
            scheme: AuthScheme::Session,
        };

        let listed = viewset.list(&as_user(&planner)).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert!(matches!(
            viewset.retrieve(&as_user(&planner), "1"),
            Err(ApiError::NotFound)
        ));
        assert!(matches!(
            viewset.create(&as_user(&planner), json!({ "username": "x", "password": "y" })),
            Err(ApiError::PermissionDenied)
        ));
        assert!(matches!(
            viewset.partial_update(&as_user(&planner), &planner.user_id.to_string(), json!({ "is_staff": true })),
            Err(ApiError::PermissionDenied)
        ));

        let updated = viewset
            .partial_update(
                &as_user(&planner),
                &planner.user_id.to_string(),
                json!({ "first_name": "Pat" }),
            )
            .unwrap();
        assert_eq!(updated["first_name"], "Pat");
    }

    #[test]
    fn test_non_staff_may_resend_own_flags() {
        let (viewset, admin) = setup();
        let created = viewset
            .create(&as_user(&admin), json!({ "username": "planner", "password": "pw" }))
            .unwrap();
        let planner = Identity {
            user_id: created["id"].as_u64().unwrap(),
            username: "planner".into(),
            is_staff: false,
            scheme: AuthScheme::Token,
        };
        let pk = planner.user_id.to_string();

        let updated = viewset
            .update(
                &as_user(&planner),
                &pk,
                json!({ "username": "planner", "is_staff": false, "is_active": true, "last_name": "Lee" }),
            )
            .unwrap();
        assert_eq!(updated["is_staff"], false);
        assert_eq!(updated["last_name"], "Lee");

        assert!(matches!(
            viewset.update(&as_user(&planner), &pk, json!({ "username": "planner", "is_staff": true })),
            Err(ApiError::PermissionDenied)
        ));
        assert!(matches!(
            viewset.partial_update(&as_user(&planner), &pk, json!({ "is_active": false })),
            Err(ApiError::PermissionDenied)
        ));
    }

    #[test]
    fn test_username_is_immutable() {
        let (viewset, admin) = setup();
        let err = viewset
            .update(&as_user(&admin), "1", json!({ "username": "root" }))
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref e) if e.contains_key("username")));
    }

    #[test]
    fn test_destroy() {
        let (viewset, admin) = setup();
        let created = viewset
            .create(&as_user(&admin), json!({ "username": "temp", "password": "pw" }))
            .unwrap();
        let pk = created["id"].to_string();
        viewset.destroy(&as_user(&admin), &pk).unwrap();
        assert!(matches!(viewset.retrieve(&as_user(&admin), &pk), Err(ApiError::NotFound)));
    }
}
