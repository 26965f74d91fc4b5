use clap::Parser;

/// A webdir mesh node: serves its own files, replicates the shared
/// directory, and forwards reads/writes for files owned by other nodes.
#[derive(Debug, Parser)]
#[command(name = "webdir-node", version, about)]
pub struct Cli {
    /// Address and port to bind the HTTP server to. If empty, listens on
    /// all interfaces with a random port.
    #[arg(long, default_value = "")]
    pub addr: String,

    /// Address of an existing mesh member to register with. If empty, this
    /// node declares itself the mesh initiator.
    #[arg(long, default_value = "")]
    pub mesh: String,

    /// Internet-reachable address for this node, advertised to peers. If
    /// empty, the bound `--addr` is used instead.
    #[arg(long = "public-addr", default_value = "")]
    pub public_addr: String,

    /// Username of this node. If empty, a random token is generated.
    #[arg(long = "name", default_value = "")]
    pub name: String,

    /// Mesh password of this node. If empty, a random token is generated.
    #[arg(long, default_value = "")]
    pub password: String,

    /// Password guarding the operator HTTP surface (`/record`, `/dir`,
    /// `/nodes`, `/ping`, `/file`, `/stop`). If empty, those routes are
    /// unauthenticated. Never applies to the peer-to-peer `/webdir` route.
    #[arg(long = "http-password", default_value = "")]
    pub http_password: String,
}
