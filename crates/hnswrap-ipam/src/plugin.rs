//! CNI command handling.

use std::io::Write;

use serde_json::Value;

use crate::args::{CmdArgs, CniCommand};
use crate::cns::{IpConfigRequest, IpamClient, KubernetesPodInfo, RETURN_CODE_NOT_FOUND};
use crate::error::{IpamError, IpamResult};
use crate::result::{CniResult, DEFAULT_CNI_VERSION, NetConf, PodAddressing, version_info};

/// IPAM plugin backed by an [`IpamClient`].
pub struct IpamPlugin<C> {
    client: C,
}

impl<C: IpamClient> IpamPlugin<C> {
    /// Create a plugin using `client` for allocations.
    pub const fn new(client: C) -> Self {
        Self { client }
    }

    /// Run the command in `args`, writing any result to `out`.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the caller reports it in CNI error form.
    pub async fn run<W: Write>(&self, args: &CmdArgs, stdin: &[u8], out: &mut W) -> IpamResult<()> {
        tracing::info!(
            command = ?args.command,
            container_id = %args.container_id,
            ifname = %args.ifname,
            "Processing CNI command"
        );

        let output = match args.command {
            CniCommand::Add => Some(self.add(args, stdin).await?),
            CniCommand::Del => {
                self.del(args).await?;
                None
            }
            CniCommand::Check => {
                self.check(args)?;
                None
            }
            CniCommand::Version => {
                let version = NetConf::parse(stdin)
                    .map_or_else(|_| DEFAULT_CNI_VERSION.to_string(), |conf| conf.cni_version);
                Some(version_info(&version))
            }
        };

        if let Some(output) = output {
            serde_json::to_writer(&mut *out, &output).map_err(std::io::Error::from)?;
            writeln!(out)?;
        }
        Ok(())
    }

    /// Handle ADD: allocate from CNS and build the versioned result.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments or configuration are invalid, CNS
    /// fails, or CNS returns an unusable configuration.
    pub async fn add(&self, args: &CmdArgs, stdin: &[u8]) -> IpamResult<Value> {
        let conf = NetConf::parse(stdin)?;
        let request = ip_config_request(args)?;

        let response = self
            .client
            .request_ip_address(&request)
            .await
            .inspect_err(|e| {
                tracing::error!(error = %e, pod_interface_id = %request.pod_interface_id, "Failed to get IP address from CNS");
            })?;

        let addressing = PodAddressing::from_response(&response)?;
        tracing::info!(
            pod_interface_id = %request.pod_interface_id,
            address = %addressing.address,
            gateway = %addressing.gateway,
            "Allocated pod address"
        );

        CniResult { addressing }.to_version(&conf.cni_version)
    }

    /// Handle DEL: release the allocation. Releasing an unknown allocation
    /// succeeds, so DEL can be repeated.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid or CNS fails.
    pub async fn del(&self, args: &CmdArgs) -> IpamResult<()> {
        let request = ip_config_request(args)?;

        match self.client.release_ip_address(&request).await {
            Ok(()) => {
                tracing::info!(pod_interface_id = %request.pod_interface_id, "Released pod address");
                Ok(())
            }
            Err(IpamError::Cns { code, message }) if code == RETURN_CODE_NOT_FOUND => {
                tracing::debug!(pod_interface_id = %request.pod_interface_id, message = %message, "No allocation to release");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Handle CHECK. CNS is the source of truth for allocations, so there
    /// is nothing to verify beyond the arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the container arguments are missing.
    pub fn check(&self, args: &CmdArgs) -> IpamResult<()> {
        args.require_container()
    }
}

/// Build the CNS request for the container in `args`.
///
/// # Errors
///
/// Returns an error if container values or pod arguments are missing.
pub fn ip_config_request(args: &CmdArgs) -> IpamResult<IpConfigRequest> {
    args.require_container()?;
    let pod = args.pod()?;

    let context = KubernetesPodInfo {
        pod_name: pod.name,
        pod_namespace: pod.namespace,
    };

    Ok(IpConfigRequest {
        desired_ip_address: String::new(),
        pod_interface_id: args.endpoint_id(),
        infra_container_id: args.container_id.clone(),
        orchestrator_context: serde_json::to_value(context)?,
    })
}
