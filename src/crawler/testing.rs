//! Scripted transport shared by the crawler unit tests

use crate::crawler::client::{ResponseOutcome, SearchRequest, Transport};
use crate::crawler::credentials::Credential;
use crate::HarvestError;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Search body with one item per repository name
pub fn search_body(full_names: &[&str]) -> String {
    let items: Vec<_> = full_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            json!({
                "name": format!("policy-{}.yaml", i),
                "path": format!("deploy/policy-{}.yaml", i),
                "score": 1.0,
                "repository": {
                    "full_name": name,
                    "private": false,
                    "owner": {"login": name.split('/').next().unwrap_or_default()}
                }
            })
        })
        .collect();
    json!({"total_count": items.len(), "items": items}).to_string()
}

/// Transport that replays canned responses and records every call
///
/// Unscripted search pages come back as empty result pages; unscripted
/// repositories come back as a minimal metadata document.
#[derive(Default)]
pub struct ScriptedTransport {
    search: Mutex<HashMap<(String, u32), VecDeque<ResponseOutcome>>>,
    repos: Mutex<HashMap<String, VecDeque<ResponseOutcome>>>,
    repo_default: Mutex<VecDeque<ResponseOutcome>>,
    search_calls: Mutex<Vec<(String, u32)>>,
    repo_calls: Mutex<Vec<String>>,
    credentials: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_response(self, prefix: &str, page: u32, outcome: ResponseOutcome) -> Self {
        self.search
            .lock()
            .unwrap()
            .entry((prefix.to_string(), page))
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn with_search_items(self, prefix: &str, page: u32, full_names: &[&str]) -> Self {
        self.with_search_response(prefix, page, ResponseOutcome::new(200, search_body(full_names)))
    }

    pub fn with_repo(self, full_name: &str, outcome: ResponseOutcome) -> Self {
        self.repos
            .lock()
            .unwrap()
            .entry(full_name.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn with_repo_response(self, outcome: ResponseOutcome) -> Self {
        self.repo_default.lock().unwrap().push_back(outcome);
        self
    }

    pub fn search_calls(&self) -> Vec<(String, u32)> {
        self.search_calls.lock().unwrap().clone()
    }

    pub fn repo_calls(&self) -> Vec<String> {
        self.repo_calls.lock().unwrap().clone()
    }

    pub fn credentials_used(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn search(
        &self,
        credential: &Credential,
        request: &SearchRequest,
    ) -> Result<ResponseOutcome, HarvestError> {
        let key = (request.filename_prefix.clone(), request.page);
        self.credentials
            .lock()
            .unwrap()
            .push(credential.secret().to_string());
        self.search_calls.lock().unwrap().push(key.clone());

        let scripted = self
            .search
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or_else(|| ResponseOutcome::new(200, search_body(&[]))))
    }

    async fn repository(
        &self,
        credential: &Credential,
        full_name: &str,
    ) -> Result<ResponseOutcome, HarvestError> {
        self.credentials
            .lock()
            .unwrap()
            .push(credential.secret().to_string());
        self.repo_calls.lock().unwrap().push(full_name.to_string());

        let scripted = self
            .repos
            .lock()
            .unwrap()
            .get_mut(full_name)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.repo_default.lock().unwrap().pop_front());
        Ok(scripted.unwrap_or_else(|| {
            ResponseOutcome::new(
                200,
                json!({"full_name": full_name, "stargazers_count": 1, "topics": []}).to_string(),
            )
        }))
    }
}
