//! Catalog view of registered service instances

use super::agent::ConnectProxyConfig;
use serde::{Deserialize, Serialize};

/// One service instance as reported by the catalog
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogService {
    #[serde(default)]
    pub node: String,

    /// Address of the node running the instance (and its local agent)
    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub datacenter: String,

    #[serde(rename = "ServiceID", default)]
    pub service_id: String,

    #[serde(default)]
    pub service_name: String,

    /// Address the instance itself listens on
    #[serde(default)]
    pub service_address: String,

    #[serde(default)]
    pub service_port: u16,

    #[serde(default)]
    pub service_tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_proxy: Option<ConnectProxyConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_sidecar_instance() {
        let services: Vec<CatalogService> = serde_json::from_value(serde_json::json!([{
            "ID": "40e4a748-2192-161a-0510-9bf59fe950b5",
            "Node": "node-1",
            "Address": "10.1.10.12",
            "Datacenter": "dc1",
            "ServiceID": "checkout-primary-6d9f-sidecar-proxy",
            "ServiceName": "checkout-sidecar-proxy",
            "ServiceAddress": "10.244.1.7",
            "ServicePort": 20000,
            "ServiceKind": "connect-proxy",
            "ServiceProxy": {
                "DestinationServiceName": "checkout",
                "LocalServicePort": 8080,
                "Upstreams": []
            }
        }]))
        .unwrap();

        let svc = &services[0];
        assert_eq!(svc.address, "10.1.10.12");
        assert_eq!(svc.service_id, "checkout-primary-6d9f-sidecar-proxy");
        let proxy = svc.service_proxy.as_ref().unwrap();
        assert_eq!(proxy.local_service_port, 8080);
        assert!(proxy.extra.contains_key("Upstreams"));
    }
}
