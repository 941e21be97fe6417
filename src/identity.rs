/// Names a deployment owns on the remote host. A pure function of
/// the application name, so a re-run or a teardown always addresses
/// exactly the same resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentIdentity {
    pub app_name: String,
    pub container: String,
    pub network: String,
    pub image: String,
    pub proxy_config: String,
}

impl DeploymentIdentity {
    pub const CONTAINER_PREFIX: &'static str = "app-container-";
    pub const NETWORK_PREFIX: &'static str = "app-network-";

    #[must_use]
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            container: format!("{}{app_name}", Self::CONTAINER_PREFIX),
            network: format!("{}{app_name}", Self::NETWORK_PREFIX),
            image: format!("{app_name}:latest"),
            proxy_config: format!("{app_name}.conf"),
        }
    }

    /// Compose project name used for multi-service launches.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.app_name
    }
}
