//! Directory API client: domains and users.

use std::sync::Arc;

use url::Url;

use crate::entities::{Domain, DomainList, User, UserList};
use crate::error::RemoteError;
use crate::transport::{HttpTransport, Request};

/// Customer alias for "the customer this subject belongs to".
pub const MY_CUSTOMER: &str = "my_customer";

const DEFAULT_BASE: &str = "https://admin.googleapis.com/admin/directory/v1/";

pub struct DirectoryService {
    transport: Arc<dyn HttpTransport>,
    base: Url,
}

impl DirectoryService {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        DirectoryService {
            transport,
            base: Url::parse(DEFAULT_BASE).expect("static base url"),
        }
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .expect("base url has a path")
            .extend(segments);
        url
    }

    /// Domains of the customer. The remote returns them in one call.
    pub async fn list_domains(&self) -> Result<Vec<Domain>, RemoteError> {
        let url = self.endpoint(["customer", MY_CUSTOMER, "domains"]);
        let list: DomainList = get_json(self.transport.as_ref(), url).await?;
        Ok(list.domains)
    }

    pub async fn get_domain(&self, name: &str) -> Result<Domain, RemoteError> {
        let url = self.endpoint(["customer", MY_CUSTOMER, "domains", name]);
        get_json(self.transport.as_ref(), url).await
    }

    /// One page of a domain's users, ordered by email.
    pub async fn list_users(
        &self,
        domain: &str,
        page_token: Option<&str>,
    ) -> Result<UserList, RemoteError> {
        let mut url = self.endpoint(["users"]);
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("domain", domain);
            q.append_pair("orderBy", "email");
            q.append_pair("maxResults", "500");
            if let Some(token) = page_token {
                q.append_pair("pageToken", token);
            }
        }
        get_json(self.transport.as_ref(), url).await
    }

    /// A single user by primary email (or id).
    pub async fn get_user(&self, key: &str) -> Result<User, RemoteError> {
        let url = self.endpoint(["users", key]);
        get_json(self.transport.as_ref(), url).await
    }
}

pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    transport: &dyn HttpTransport,
    url: Url,
) -> Result<T, RemoteError> {
    let res = transport.execute(Request::get(url)).await?;
    let status = res.status;
    let body = res.bytes().await?;
    if !status.is_success() {
        return Err(RemoteError::Status {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    Ok(serde_json::from_slice(&body)?)
}
