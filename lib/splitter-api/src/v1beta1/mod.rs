/// API version v1beta1 of the canary resource

pub mod canary;
pub mod target;

pub use canary::Canary;
pub use target::CanaryTarget;

/// API group of the canary resource
pub const API_GROUP: &str = "flagger.app";
/// API version of the canary resource
pub const API_VERSION: &str = "v1beta1";

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    #[test]
    fn test_constants_match_resource() {
        assert_eq!(Canary::group(&()), API_GROUP);
        assert_eq!(Canary::version(&()), API_VERSION);
        assert_eq!(Canary::api_version(&()), format!("{}/{}", API_GROUP, API_VERSION));
    }
}
