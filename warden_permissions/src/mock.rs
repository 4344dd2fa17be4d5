//! An in-memory permission authority for tests

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use warden_traits::JsonClient;

#[derive(Debug, Error)]
#[error("{0}")]
pub(crate) struct MockError(String);

/// A recorded call: method, URL, and the JSON body of a `POST`
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Call {
    pub(crate) method: &'static str,
    pub(crate) url: String,
    pub(crate) body: Option<Value>,
}

#[derive(Debug, Default)]
pub(crate) struct MockAuthority {
    routes: HashMap<String, Result<Value, String>>,
    calls: Mutex<Vec<Call>>,
}

impl MockAuthority {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(mut self, url: &str, body: Value) -> Self {
        self.routes.insert(url.to_owned(), Ok(body));
        self
    }

    pub(crate) fn fail(mut self, url: &str, message: &str) -> Self {
        self.routes.insert(url.to_owned(), Err(message.to_owned()));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn answer<R: DeserializeOwned>(
        &self,
        method: &'static str,
        url: &str,
        body: Option<Value>,
    ) -> Result<R, MockError> {
        self.calls.lock().unwrap().push(Call {
            method,
            url: url.to_owned(),
            body,
        });

        match self.routes.get(url) {
            Some(Ok(value)) => {
                serde_json::from_value(value.clone()).map_err(|e| MockError(e.to_string()))
            }
            Some(Err(message)) => Err(MockError(message.clone())),
            None => Err(MockError(format!("no route for {url}"))),
        }
    }
}

#[async_trait]
impl JsonClient for MockAuthority {
    type Error = MockError;

    async fn get_json<R>(&self, url: &str) -> Result<R, Self::Error>
    where
        R: DeserializeOwned + Send,
    {
        self.answer("GET", url, None)
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, Self::Error>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send,
    {
        let body = serde_json::to_value(body).map_err(|e| MockError(e.to_string()))?;
        self.answer("POST", url, Some(body))
    }
}
