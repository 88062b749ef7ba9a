//! Staff endpoints.

use serde_json::Value;

use super::error::{ServiceError, ServiceResult};
use super::{resource_path, swallow_unauthorized, ApiClient};
use crate::models::{
    CreateStaffRequest, DeleteMode, DeleteStaffParams, StaffMember, UpdateStaffRequest,
};

/// Staff HR operations against `/api/staff`.
#[derive(Clone)]
pub struct StaffService {
    client: ApiClient,
}

impl StaffService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn create_staff(&self, request: &CreateStaffRequest) -> ServiceResult<StaffMember> {
        if request.name.trim().is_empty() {
            return Err(ServiceError::validation("Name is required"));
        }
        if request.role.trim().is_empty() {
            return Err(ServiceError::validation("Role is required"));
        }
        self.client.post("/api/staff", request).await
    }

    /// Active staff. A rejected session yields an empty list.
    pub async fn get_all_staff(&self) -> ServiceResult<Vec<StaffMember>> {
        swallow_unauthorized("getAllStaff", self.client.get("/api/staff", &()).await)
    }

    /// Soft-deleted staff. A rejected session yields an empty list.
    pub async fn get_deleted_staff(&self) -> ServiceResult<Vec<StaffMember>> {
        swallow_unauthorized(
            "getDeletedStaff",
            self.client.get("/api/staff/deleted", &()).await,
        )
    }

    pub async fn get_staff_by_id(&self, id: &str) -> ServiceResult<StaffMember> {
        self.client.get(&staff_path(id)?, &()).await
    }

    pub async fn update_staff(
        &self,
        id: &str,
        request: &UpdateStaffRequest,
    ) -> ServiceResult<StaffMember> {
        self.client.put(&staff_path(id)?, request).await
    }

    /// Delete a member. Soft deletion returns the flagged record; hard deletion returns `None`.
    pub async fn delete_staff(
        &self,
        id: &str,
        mode: DeleteMode,
        reason: Option<String>,
    ) -> ServiceResult<Option<StaffMember>> {
        let params = DeleteStaffParams {
            mode,
            reason: reason.filter(|r| !r.trim().is_empty()),
            deleted_by: None,
        };
        let data: Value = self.client.delete(&staff_path(id)?, &params).await?;
        match data {
            Value::Null => Ok(None),
            other => Ok(Some(serde_json::from_value(other)?)),
        }
    }

    pub async fn restore_staff(&self, id: &str) -> ServiceResult<StaffMember> {
        let path = format!("{}/restore", staff_path(id)?);
        self.client.post(&path, &()).await
    }
}

fn staff_path(id: &str) -> ServiceResult<String> {
    resource_path("/api/staff", id, "Staff")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::FakeTransport;
    use crate::client::{ErrorKind, RequestContext};
    use reqwest::Method;
    use std::sync::Arc;

    fn service(transport: &Arc<FakeTransport>) -> StaffService {
        let client = ApiClient::new(transport.clone(), RequestContext::new("tok", "acme"));
        StaffService::new(client)
    }

    #[tokio::test]
    async fn test_unauthorized_list_is_empty() {
        let transport = Arc::new(FakeTransport::replying(
            401,
            r#"{"success":false,"error":{"code":"UNAUTHORIZED","message":"Invalid token"}}"#,
        ));
        let staff = service(&transport).get_all_staff().await.unwrap();
        assert!(staff.is_empty());
        assert!(service(&transport).get_deleted_staff().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_single_read_is_an_error() {
        let transport = Arc::new(FakeTransport::replying(401, "{}"));
        let err = service(&transport).get_staff_by_id("s1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn test_delete_sends_mode_and_reason() {
        let transport = Arc::new(FakeTransport::replying(
            200,
            r#"{"success":true,"data":null,"message":"Staff member permanently deleted"}"#,
        ));
        let removed = service(&transport)
            .delete_staff("s1", DeleteMode::Hard, Some("left company".to_string()))
            .await
            .unwrap();
        assert!(removed.is_none());

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::DELETE);
        assert_eq!(sent[0].path, "/api/staff/s1");
        assert!(sent[0]
            .query
            .contains(&("mode".to_string(), "hard".to_string())));
        assert!(sent[0]
            .query
            .contains(&("reason".to_string(), "left company".to_string())));
    }

    #[tokio::test]
    async fn test_restore_encodes_id_segment() {
        let transport = Arc::new(FakeTransport::replying(404, "{}"));
        let err = service(&transport)
            .restore_staff("s1/../../tasks?x=1")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(
            transport.requests()[0].path,
            "/api/staff/s1%2F..%2F..%2Ftasks%3Fx%3D1/restore"
        );
    }

    #[tokio::test]
    async fn test_blank_input_never_reaches_transport() {
        let transport = Arc::new(FakeTransport::replying(200, "{}"));
        let svc = service(&transport);

        let err = svc.restore_staff("  ").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let err = svc
            .create_staff(&CreateStaffRequest {
                name: "Anita".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "Role is required");
        assert_eq!(transport.calls(), 0);
    }
}
