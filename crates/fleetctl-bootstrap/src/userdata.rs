//! Ties kubeconfig + node settings together into the boot script a provider
//! injects at instance-create time (spec.md 4.E).

use fleetctl_provider::UserData;
use tracing::debug;

use crate::error::Result;
use crate::kubeconfig::KubeconfigParams;
use crate::node_settings::NodeSettings;

/// Renders the boot script. The actual templating (cloud-init, Ignition,
/// ...) is an external collaborator; this crate hands it the two inputs
/// spec.md 4.E names and trusts it to do the rendering.
pub trait UserDataGenerator: Send + Sync {
    fn render(&self, kubeconfig: &str, node_settings: &NodeSettings) -> Result<UserData>;
}

/// Produces the userdata for a freshly provisioning machine: kubeconfig
/// (cluster + CA + bootstrap token) plus node settings, handed to
/// `generator` (spec.md 4.E).
pub fn generate<G: UserDataGenerator>(
    generator: &G,
    kubeconfig_params: &KubeconfigParams<'_>,
    node_settings: &NodeSettings,
) -> Result<UserData> {
    let kubeconfig = crate::kubeconfig::render(kubeconfig_params);
    debug!(cluster = kubeconfig_params.cluster_name, "rendering userdata");
    generator.render(&kubeconfig, node_settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::ClusterCaData;
    use crate::token::BootstrapToken;

    struct EchoGenerator;
    impl UserDataGenerator for EchoGenerator {
        fn render(&self, kubeconfig: &str, node_settings: &NodeSettings) -> Result<UserData> {
            Ok(UserData(format!(
                "{kubeconfig}\n# runtime={}",
                node_settings.container_runtime
            )))
        }
    }

    #[test]
    fn generate_threads_kubeconfig_and_settings_to_the_generator() {
        let ca = ClusterCaData("ca".into());
        let token = BootstrapToken::mint("uid-1");
        let params = KubeconfigParams {
            cluster_name: "demo",
            server: "https://10.0.0.1:6443",
            ca: &ca,
            token: &token,
        };
        let settings = NodeSettings::new("containerd", "registry.k8s.io/pause:3.9");
        let userdata = generate(&EchoGenerator, &params, &settings).unwrap();
        assert!(userdata.0.contains("current-context"));
        assert!(userdata.0.contains("runtime=containerd"));
    }
}
