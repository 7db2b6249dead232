//! Blocking client for the OSM API v0.6.
//!
//! | call                                  | used for                       |
//! |---------------------------------------|--------------------------------|
//! | `GET  /changeset/{id}`                | author display name            |
//! | `GET  /changeset/{id}/download`       | the changeset's osmChange      |
//! | `GET  /{type}/{id}`                   | current state (410 = deleted)  |
//! | `GET  /{type}/{id}/{version}`         | historic state                 |
//! | `PUT  /changeset/create`              | open the revert changeset      |
//! | `POST /changeset/{id}/upload`         | submit the inverse osmChange   |
//! | `PUT  /changeset/{id}/close`          | close the revert changeset     |
//!
//! Credentials are sent as HTTP basic auth on every request.

use std::collections::BTreeMap;
use std::io::BufReader;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use sisyphus_core::{ChangesetId, Config};

use crate::element::{Action, Element, ElementType};
use crate::error::{describe, RevertError};
use crate::revert::{Diff, ElementSource, ReversibleChangeSet};
use crate::transaction::ChangesetApi;
use crate::xml::{changeset_xml, osc_xml, parse_changeset_user, parse_elements};

const API_PREFIX: &str = "api/0.6";

pub struct OsmApi {
    agent: ureq::Agent,
    base: String,
    authorization: Option<String>,
    generator: String,
}

impl OsmApi {
    pub fn new(endpoint: &str, timeout: Duration, generator: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("sisyphus/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base: format!("{}/{API_PREFIX}", endpoint.trim_end_matches('/')),
            authorization: None,
            generator: generator.into(),
        }
    }

    /// Client for `config.api_endpoint`, authenticated when credentials are set.
    pub fn from_config(config: &Config) -> Self {
        let api = Self::new(&config.api_endpoint, config.http_timeout(), &config.created_by);
        if config.has_credentials() {
            api.with_basic_auth(&config.osm_username, &config.osm_password)
        } else {
            api
        }
    }

    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        let token = STANDARD.encode(format!("{username}:{password}"));
        self.authorization = Some(format!("Basic {token}"));
        self
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let request = self.agent.request(method, &format!("{}/{path}", self.base));
        match &self.authorization {
            Some(auth) => request.set("Authorization", auth),
            None => request,
        }
    }

    fn get_elements(&self, path: &str) -> Result<Vec<(Option<Action>, Element)>, RevertError> {
        let response = self
            .request("GET", path)
            .call()
            .map_err(|e| RevertError::download(path, describe(e)))?;
        parse_elements(BufReader::new(response.into_reader()))
            .map_err(|e| RevertError::download(path, e))
    }
}

impl ElementSource for OsmApi {
    fn changeset_author(&self, id: ChangesetId) -> Result<String, RevertError> {
        let path = format!("changeset/{id}");
        let response = self
            .request("GET", &path)
            .call()
            .map_err(|e| RevertError::download(&path, describe(e)))?;
        let user = parse_changeset_user(BufReader::new(response.into_reader()))
            .map_err(|e| RevertError::download(&path, e))?;
        // Changesets from before 2008 may be anonymous.
        Ok(user.unwrap_or_else(|| "anonymous".to_string()))
    }

    fn changeset_changes(&self, id: ChangesetId) -> Result<Vec<Diff>, RevertError> {
        let path = format!("changeset/{id}/download");
        self.get_elements(&path)?
            .into_iter()
            .map(|(action, element)| {
                let action = action.ok_or_else(|| {
                    RevertError::download(&path, format!("{element} outside any osmChange section"))
                })?;
                Ok(Diff { action, element })
            })
            .collect()
    }

    fn current(&self, kind: ElementType, id: i64) -> Result<Option<Element>, RevertError> {
        let path = format!("{kind}/{id}");
        match self.request("GET", &path).call() {
            Ok(response) => {
                let mut elements = parse_elements(BufReader::new(response.into_reader()))
                    .map_err(|e| RevertError::download(&path, e))?;
                match elements.pop() {
                    Some((_, element)) => Ok(Some(element)),
                    None => Err(RevertError::download(&path, "empty response")),
                }
            }
            Err(ureq::Error::Status(410, _)) => Ok(None),
            Err(e) => Err(RevertError::download(&path, describe(e))),
        }
    }

    fn version(&self, kind: ElementType, id: i64, version: u64) -> Result<Element, RevertError> {
        let path = format!("{kind}/{id}/{version}");
        self.get_elements(&path)?
            .pop()
            .map(|(_, element)| element)
            .ok_or_else(|| RevertError::download(&path, "empty response"))
    }
}

impl ChangesetApi for OsmApi {
    fn create(&self, tags: &BTreeMap<String, String>) -> Result<ChangesetId, RevertError> {
        let body = self
            .request("PUT", "changeset/create")
            .set("Content-Type", "text/xml")
            .send_string(&changeset_xml(tags))
            .map_err(|e| RevertError::Create(describe(e)))?
            .into_string()
            .map_err(|e| RevertError::Create(e.to_string()))?;
        body.parse::<ChangesetId>()
            .map_err(|_| RevertError::Create(format!("unexpected response body {body:?}")))
    }

    fn upload(
        &self,
        changeset: ChangesetId,
        changes: &ReversibleChangeSet,
    ) -> Result<(), RevertError> {
        let osc = osc_xml(
            changes.iter().map(|c| (c.action, &c.element)),
            changeset,
            &self.generator,
        );
        self.request("POST", &format!("changeset/{changeset}/upload"))
            .set("Content-Type", "text/xml")
            .send_string(&osc)
            .map_err(|e| RevertError::Upload {
                changeset,
                reason: describe(e),
            })?;
        Ok(())
    }

    fn close(&self, changeset: ChangesetId) -> Result<(), RevertError> {
        self.request("PUT", &format!("changeset/{changeset}/close"))
            .call()
            .map_err(|e| RevertError::Close {
                changeset,
                reason: describe(e),
            })?;
        Ok(())
    }
}
