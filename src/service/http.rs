use super::{
    AllocationReply, AllocationRequest, CollectReply, CollectRequest, CyclesReply, HeapService,
    ReferenceRequest, WorkloadRequest,
};
use crate::config::VizConfig;
use crate::error::{Result, VizError};
use crate::model::{BlockId, CycleRecord, HeapConfig, HeapSnapshot};

use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

/// A [`HeapService`] reached over HTTP/JSON.
pub struct HttpService {
    client: Client,
    api: String,
}

impl HttpService {
    pub fn new(config: &VizConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            api: format!("{}/api", config.api_url.trim_end_matches('/')),
        })
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api, path)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send()?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        // The body usually carries the service's `detail` message.
        let body = response.text().unwrap_or_default();

        Err(VizError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self.send(request)?.json()?)
    }
}

impl HeapService for HttpService {
    fn init_heap(&self, config: &HeapConfig) -> Result<()> {
        debug!("POST /heap/init {:?}", config);
        self.send(self.client.post(self.url("/heap/init")).json(config))?;
        Ok(())
    }

    fn heap_state(&self) -> Result<HeapSnapshot> {
        self.send_json(self.client.get(self.url("/heap/state")))
    }

    fn allocate(&self, request: &AllocationRequest) -> Result<BlockId> {
        debug!("POST /heap/allocate {:?}", request);
        let reply: AllocationReply =
            self.send_json(self.client.post(self.url("/heap/allocate")).json(request))?;

        Ok(reply.block_id)
    }

    fn deallocate(&self, id: &BlockId) -> Result<()> {
        debug!("DELETE /heap/deallocate/{}", id);
        self.send(self.client.delete(self.url(&format!("/heap/deallocate/{}", id))))?;
        Ok(())
    }

    fn add_reference(&self, request: &ReferenceRequest) -> Result<()> {
        debug!("POST /heap/reference {:?}", request);
        self.send(self.client.post(self.url("/heap/reference")).json(request))?;
        Ok(())
    }

    fn remove_reference(&self, request: &ReferenceRequest) -> Result<()> {
        debug!("DELETE /heap/reference {:?}", request);
        self.send(self.client.delete(self.url("/heap/reference")).json(request))?;
        Ok(())
    }

    fn collect(&self, request: &CollectRequest) -> Result<CollectReply> {
        debug!("POST /gc/collect {:?}", request);
        self.send_json(self.client.post(self.url("/gc/collect")).json(request))
    }

    fn generate_workload(&self, request: &WorkloadRequest) -> Result<()> {
        debug!("POST /workload/generate {:?}", request);
        self.send(self.client.post(self.url("/workload/generate")).json(request))?;
        Ok(())
    }

    fn cycles(&self) -> Result<Vec<CycleRecord>> {
        let reply: CyclesReply = self.send_json(self.client.get(self.url("/metrics/cycles")))?;

        Ok(reply.cycles)
    }

    fn reset_heap(&self) -> Result<()> {
        debug!("POST /heap/reset");
        self.send(self.client.post(self.url("/heap/reset")))?;
        Ok(())
    }
}
