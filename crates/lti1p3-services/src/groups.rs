// crates/lti1p3-services/src/groups.rs
// ============================================================================
// Module: Course Groups Service
// Description: Client for the LTI context group service.
// Purpose: Fetch groups and group sets with pagination and set joining.
// Dependencies: crate::connector, serde, serde_json, url
// ============================================================================

//! ## Overview
//! The context group service lists the groups and group sets of the course
//! a launch happened in. Endpoints and granted scopes arrive in the launch
//! claim as [`GroupsServiceData`]. Listings are paginated containers; this
//! client follows `Link` headers with `rel="next"` to exhaustion and can
//! join groups onto their group sets by `set_id`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::connector::ServiceConnector;
use crate::connector::ServiceError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Accept header for context group container payloads.
const GROUP_CONTAINER_ACCEPT: &str = "application/vnd.ims.lti-gs.v1.contextgroupcontainer+json";

/// Content type sent with group service requests.
const GROUP_REQUEST_CONTENT_TYPE: &str = "application/json";

// ============================================================================
// SECTION: Claim Data
// ============================================================================

/// Claim payload configuring the course groups service endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupsServiceData {
    /// Endpoint listing the context's groups.
    pub context_groups_url: String,
    /// Endpoint listing the context's group sets, when the platform offers
    /// one.
    #[serde(default)]
    pub context_group_sets_url: Option<String>,
    /// Scopes the platform grants for this service.
    pub scope: Vec<String>,
    /// Service versions the platform implements.
    pub service_versions: Vec<String>,
}

// ============================================================================
// SECTION: Service Client
// ============================================================================

/// Client for the course groups service of one launch context.
pub struct CourseGroupsService<'a> {
    /// Connector used to authenticate and perform requests.
    connector: &'a ServiceConnector,
    /// Endpoint and scope data from the launch claim.
    service_data: GroupsServiceData,
}

impl<'a> CourseGroupsService<'a> {
    /// Creates a service client over an authenticated connector.
    #[must_use]
    pub const fn new(connector: &'a ServiceConnector, service_data: GroupsServiceData) -> Self {
        Self {
            connector,
            service_data,
        }
    }

    /// Returns the claim data this client was configured with.
    #[must_use]
    pub const fn service_data(&self) -> &GroupsServiceData {
        &self.service_data
    }

    /// Fetches one container page and extracts the items under `data_key`.
    ///
    /// A page whose body lacks `data_key` yields an empty item list.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the request fails or the endpoint
    /// answers with a non-success status.
    pub fn get_page(
        &self,
        data_url: &str,
        data_key: &str,
    ) -> Result<(Vec<Value>, Option<String>), ServiceError> {
        let page = self.connector.make_service_request(
            &self.service_data.scope,
            data_url,
            None,
            GROUP_CONTAINER_ACCEPT,
            GROUP_REQUEST_CONTENT_TYPE,
        )?;
        let items = page
            .body
            .get(data_key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok((items, page.next_page_url))
    }

    /// Fetches every group in the context, following pagination.
    ///
    /// When `user_id` is given it is appended as a query parameter to the
    /// first page URL, restricting the listing to that user's groups.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when a page request fails or the groups URL
    /// cannot be extended with the user id.
    pub fn get_groups(&self, user_id: Option<&str>) -> Result<Vec<Value>, ServiceError> {
        let first_url = match user_id {
            Some(user_id) => with_user_id(&self.service_data.context_groups_url, user_id)?,
            None => self.service_data.context_groups_url.clone(),
        };
        self.collect_pages(first_url, "groups")
    }

    /// Reports whether the platform advertised a group sets endpoint.
    #[must_use]
    pub const fn has_sets(&self) -> bool {
        self.service_data.context_group_sets_url.is_some()
    }

    /// Fetches every group set, optionally attaching member groups.
    ///
    /// Without a sets endpoint the listing is empty. With `include_groups`
    /// every set gains a `groups` array and each group is attached to the
    /// set whose `id` equals the group's `set_id`; groups without a known
    /// `set_id` are left out.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when a page request fails.
    pub fn get_sets(&self, include_groups: bool) -> Result<Vec<Value>, ServiceError> {
        let Some(sets_url) = self.service_data.context_group_sets_url.clone() else {
            return Ok(Vec::new());
        };
        let mut sets = self.collect_pages(sets_url, "sets")?;
        if include_groups {
            for set in &mut sets {
                if let Some(members) = set.as_object_mut() {
                    members.insert("groups".to_string(), Value::Array(Vec::new()));
                }
            }
            for group in self.get_groups(None)? {
                let position = group
                    .get("set_id")
                    .and_then(|set_id| sets.iter().position(|set| set.get("id") == Some(set_id)));
                let Some(position) = position else {
                    continue;
                };
                if let Some(members) = sets
                    .get_mut(position)
                    .and_then(|set| set.get_mut("groups"))
                    .and_then(Value::as_array_mut)
                {
                    members.push(group);
                }
            }
        }
        Ok(sets)
    }

    /// Follows container pagination until no next page remains.
    fn collect_pages(&self, first_url: String, data_key: &str) -> Result<Vec<Value>, ServiceError> {
        let mut items = Vec::new();
        let mut next_url = Some(first_url);
        while let Some(url) = next_url {
            let (mut page_items, next_page) = self.get_page(&url, data_key)?;
            items.append(&mut page_items);
            next_url = next_page;
        }
        Ok(items)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Appends the `user_id` query parameter to a service URL.
fn with_user_id(url: &str, user_id: &str) -> Result<String, ServiceError> {
    let mut parsed = Url::parse(url).map_err(|source| ServiceError::Url {
        url: url.to_string(),
        source,
    })?;
    parsed.query_pairs_mut().append_pair("user_id", user_id);
    Ok(parsed.into())
}
