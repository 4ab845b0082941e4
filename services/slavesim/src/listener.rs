//! Protocol listeners (TCP and serial RTU)
//!
//! Each listener binds its transport, reports the bind outcome once through
//! `ready`, then serves until `cancel` fires. Dropping the serve future
//! releases the socket or serial handle.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Result, SlaveSimError};
use crate::server::SlaveService;
use crate::transport::{Framing, Parity, SerialConfig, TcpConfig, TransportConfig};

/// Bind outcome: the bound address summary, or why binding failed
pub type ReadySender = oneshot::Sender<Result<String>>;

/// Run the listener for `transport` until cancelled
///
/// Returns `Err` only for failures after a successful bind.
pub async fn run(
    transport: TransportConfig,
    service: SlaveService,
    cancel: CancellationToken,
    ready: ReadySender,
) -> Result<()> {
    match transport {
        TransportConfig::Tcp(cfg) => serve_tcp(&cfg, service, &cancel, ready).await,
        TransportConfig::Serial(cfg) => serve_rtu(&cfg, service, &cancel, ready).await,
    }
}

async fn serve_tcp(
    cfg: &TcpConfig,
    service: SlaveService,
    cancel: &CancellationToken,
    ready: ReadySender,
) -> Result<()> {
    let endpoint = format!("{}:{}", cfg.host, cfg.port);
    let listener = match TcpListener::bind((cfg.host.as_str(), cfg.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            let _ = ready.send(Err(SlaveSimError::bind(endpoint, e)));
            return Ok(());
        },
    };
    let bound = listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or(endpoint);

    let server = Server::new(listener);
    let on_connected = |stream: TcpStream, socket_addr: SocketAddr| {
        let service = service.clone();
        async move {
            debug!("Client connected: {}", socket_addr);
            accept_tcp_connection(stream, socket_addr, move |_| Ok(Some(service.clone())))
        }
    };
    let on_process_error = |err: std::io::Error| {
        debug!("Connection closed: {}", err);
    };

    if ready.send(Ok(bound.clone())).is_err() {
        // Nobody waits for this listener any more
        return Ok(());
    }
    info!("TCP listener bound: {}", bound);

    tokio::select! {
        _ = cancel.cancelled() => Ok(()),
        result = server.serve(&on_connected, on_process_error) => match result {
            Ok(_) => Err(SlaveSimError::internal(format!("TCP listener {} exited", bound))),
            Err(e) => Err(SlaveSimError::bind(bound, e)),
        },
    }
}

async fn serve_rtu(
    cfg: &SerialConfig,
    service: SlaveService,
    cancel: &CancellationToken,
    ready: ReadySender,
) -> Result<()> {
    let port = match open_serial(cfg) {
        Ok(port) => port,
        Err(e) => {
            let _ = ready.send(Err(e));
            return Ok(());
        },
    };
    let bound = format!("serial {}@{}", cfg.device, cfg.baudrate);
    let server = tokio_modbus::server::rtu::Server::new(port);

    if ready.send(Ok(bound.clone())).is_err() {
        return Ok(());
    }
    info!("RTU listener opened: {}", bound);

    tokio::select! {
        _ = cancel.cancelled() => Ok(()),
        result = server.serve_forever(service) => match result {
            Ok(()) => Err(SlaveSimError::internal(format!("RTU listener {} exited", bound))),
            Err(e) => Err(SlaveSimError::bind(bound, e)),
        },
    }
}

/// Open the serial device with the configured line settings
///
/// ASCII framing and mark/space parity have no backend support and fail as
/// bind errors.
pub fn open_serial(cfg: &SerialConfig) -> Result<SerialStream> {
    let endpoint = cfg.device.clone();

    if cfg.framing == Framing::Ascii {
        return Err(SlaveSimError::bind(
            endpoint,
            "ASCII framing is not supported, use RTU",
        ));
    }

    let parity = match cfg.parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Even => tokio_serial::Parity::Even,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Mark | Parity::Space => {
            return Err(SlaveSimError::bind(
                endpoint,
                format!("{:?} parity is not supported", cfg.parity),
            ));
        },
    };

    let data_bits = match cfg.bytesize {
        7 => tokio_serial::DataBits::Seven,
        8 => tokio_serial::DataBits::Eight,
        other => {
            return Err(SlaveSimError::bind(endpoint, format!("unsupported bytesize {}", other)));
        },
    };

    let stop_bits = match cfg.stopbits {
        1 => tokio_serial::StopBits::One,
        2 => tokio_serial::StopBits::Two,
        other => {
            return Err(SlaveSimError::bind(endpoint, format!("unsupported stopbits {}", other)));
        },
    };

    debug!("RTU: {} @{}baud", cfg.device, cfg.baudrate);
    tokio_serial::new(cfg.device.as_str(), cfg.baudrate)
        .data_bits(data_bits)
        .parity(parity)
        .stop_bits(stop_bits)
        .timeout(cfg.timeout())
        .open_native_async()
        .map_err(|e| SlaveSimError::bind(endpoint, e))
}
