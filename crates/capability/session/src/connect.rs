//! 按配置构建寄存器传输。

use crate::error::SessionError;
use inverter_config::{AppConfig, TransportKind};
use inverter_protocol::{
    HttpTunnelConfig, HttpTunnelTransport, ModbusClient, QuirkyTcpTransport, RegisterTransport,
    TcpTransportConfig,
};
use tracing::info;

/// TCP 传输配置
pub fn tcp_config(config: &AppConfig) -> TcpTransportConfig {
    let mut tcp = TcpTransportConfig::new(config.host.clone());
    tcp.port = config.tcp_port;
    tcp.unit_id = config.slave_id;
    tcp.timeout_ms = config.timeout_ms;
    tcp.idle_timeout_ms = config.idle_timeout_ms;
    tcp
}

/// 隧道传输配置
pub fn tunnel_config(config: &AppConfig) -> HttpTunnelConfig {
    let mut tunnel = HttpTunnelConfig::new(config.host.clone());
    tunnel.http_port = config.http_port;
    tunnel.ws_port = config.ws_port;
    tunnel.slave_id = config.slave_id;
    tunnel.timeout_ms = config.timeout_ms;
    tunnel
}

/// 构建配置选定的传输。连接与握手在第一次读取时进行。
pub fn connect_transport(config: &AppConfig) -> Result<Box<dyn RegisterTransport>, SessionError> {
    info!(
        target: "inverter.session",
        host = %config.host,
        transport = %config.transport,
        "transport_configured"
    );

    let client = match config.transport {
        TransportKind::Tcp => ModbusClient::new(QuirkyTcpTransport::new(tcp_config(config))),
        TransportKind::Http => ModbusClient::new(HttpTunnelTransport::new(tunnel_config(config))?),
    };
    Ok(Box::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_config(transport: TransportKind) -> AppConfig {
        AppConfig {
            host: "10.0.0.84".to_string(),
            transport,
            tcp_port: 1502,
            http_port: 8080,
            ws_port: 9082,
            slave_id: 3,
            timeout_ms: 2_000,
            idle_timeout_ms: 30_000,
        }
    }

    #[test]
    fn test_tcp_config() {
        let tcp = tcp_config(&app_config(TransportKind::Tcp));
        assert_eq!(tcp.host, "10.0.0.84");
        assert_eq!(tcp.port, 1502);
        assert_eq!(tcp.unit_id, 3);
        assert_eq!(tcp.timeout_ms, 2_000);
        assert_eq!(tcp.idle_timeout_ms, 30_000);
    }

    #[test]
    fn test_tunnel_config() {
        let tunnel = tunnel_config(&app_config(TransportKind::Http));
        assert_eq!(tunnel.http_port, 8080);
        assert_eq!(tunnel.ws_port, 9082);
        assert_eq!(tunnel.slave_id, 3);
    }

    #[test]
    fn test_connect_transport_is_lazy() {
        // 构建不发起任何连接
        assert!(connect_transport(&app_config(TransportKind::Tcp)).is_ok());
        assert!(connect_transport(&app_config(TransportKind::Http)).is_ok());
    }
}
