//! Modbus request handling
//!
//! Bridges the protocol library's request/response types onto a
//! [`RegisterFacade`]. One service instance is cloned per client connection;
//! all clones share the same stores.

use std::future;
use std::sync::Arc;

use tokio_modbus::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::facade::RegisterFacade;
use crate::register::RegisterClass;

/// Protocol limits per request
const MAX_READ_BITS: u16 = 2000;
const MAX_WRITE_BITS: usize = 1968;
const MAX_READ_WORDS: u16 = 125;
const MAX_WRITE_WORDS: usize = 123;

/// Request handler for one simulated slave
#[derive(Debug, Clone)]
pub struct SlaveService {
    name: Arc<str>,
    unit_id: u8,
    /// Also answer unit id 0xFF, the usual "don't care" value on TCP
    accept_tcp_wildcard: bool,
    facade: Arc<RegisterFacade>,
    cancel: CancellationToken,
}

impl SlaveService {
    pub fn new(
        name: impl Into<Arc<str>>,
        unit_id: u8,
        facade: Arc<RegisterFacade>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            unit_id,
            accept_tcp_wildcard: false,
            facade,
            cancel,
        }
    }

    pub fn with_tcp_wildcard(mut self, enabled: bool) -> Self {
        self.accept_tcp_wildcard = enabled;
        self
    }

    /// Whether a request for `unit` is addressed to this slave
    pub fn accepts(&self, unit: u8) -> bool {
        unit == self.unit_id || (self.accept_tcp_wildcard && unit == 0xFF)
    }

    /// Execute one request against the stores
    pub fn handle(&self, request: Request<'_>) -> Result<Response, ExceptionCode> {
        let facade = &self.facade;
        match request {
            Request::ReadCoils(addr, qty) => {
                check_range(addr, qty, MAX_READ_BITS)?;
                facade
                    .read_bits(RegisterClass::Coil, u32::from(addr), usize::from(qty))
                    .map(Response::ReadCoils)
                    .map_err(|_| ExceptionCode::IllegalDataAddress)
            },
            Request::ReadDiscreteInputs(addr, qty) => {
                check_range(addr, qty, MAX_READ_BITS)?;
                facade
                    .read_bits(RegisterClass::DiscreteInput, u32::from(addr), usize::from(qty))
                    .map(Response::ReadDiscreteInputs)
                    .map_err(|_| ExceptionCode::IllegalDataAddress)
            },
            Request::WriteSingleCoil(addr, coil) => facade
                .write_bits(RegisterClass::Coil, u32::from(addr), &[coil])
                .map(|_| Response::WriteSingleCoil(addr, coil))
                .map_err(|_| ExceptionCode::IllegalDataAddress),
            Request::WriteMultipleCoils(addr, coils) => {
                let qty = checked_write_len(addr, coils.len(), MAX_WRITE_BITS)?;
                facade
                    .write_bits(RegisterClass::Coil, u32::from(addr), &coils)
                    .map(|_| Response::WriteMultipleCoils(addr, qty))
                    .map_err(|_| ExceptionCode::IllegalDataAddress)
            },
            Request::ReadHoldingRegisters(addr, qty) => {
                check_range(addr, qty, MAX_READ_WORDS)?;
                facade
                    .read_words(RegisterClass::Holding, u32::from(addr), usize::from(qty))
                    .map(Response::ReadHoldingRegisters)
                    .map_err(|_| ExceptionCode::IllegalDataAddress)
            },
            Request::ReadInputRegisters(addr, qty) => {
                check_range(addr, qty, MAX_READ_WORDS)?;
                facade
                    .read_words(RegisterClass::Input, u32::from(addr), usize::from(qty))
                    .map(Response::ReadInputRegisters)
                    .map_err(|_| ExceptionCode::IllegalDataAddress)
            },
            Request::WriteSingleRegister(addr, word) => facade
                .write_words(RegisterClass::Holding, u32::from(addr), &[word])
                .map(|_| Response::WriteSingleRegister(addr, word))
                .map_err(|_| ExceptionCode::IllegalDataAddress),
            Request::WriteMultipleRegisters(addr, words) => {
                let qty = checked_write_len(addr, words.len(), MAX_WRITE_WORDS)?;
                facade
                    .write_words(RegisterClass::Holding, u32::from(addr), &words)
                    .map(|_| Response::WriteMultipleRegisters(addr, qty))
                    .map_err(|_| ExceptionCode::IllegalDataAddress)
            },
            Request::MaskWriteRegister(addr, and_mask, or_mask) => {
                facade
                    .store(RegisterClass::Holding)
                    .update(u32::from(addr), |current| {
                        (current & and_mask) | (or_mask & !and_mask)
                    })
                    .map(|_| Response::MaskWriteRegister(addr, and_mask, or_mask))
                    .map_err(|_| ExceptionCode::IllegalDataAddress)
            },
            Request::ReadWriteMultipleRegisters(read_addr, qty, write_addr, words) => {
                check_range(read_addr, qty, MAX_READ_WORDS)?;
                checked_write_len(write_addr, words.len(), MAX_WRITE_WORDS)?;
                // Write happens before the read, per the function definition
                facade
                    .write_words(RegisterClass::Holding, u32::from(write_addr), &words)
                    .and_then(|_| {
                        facade.read_words(
                            RegisterClass::Holding,
                            u32::from(read_addr),
                            usize::from(qty),
                        )
                    })
                    .map(Response::ReadWriteMultipleRegisters)
                    .map_err(|_| ExceptionCode::IllegalDataAddress)
            },
            _ => Err(ExceptionCode::IllegalFunction),
        }
    }
}

fn check_range(addr: u16, qty: u16, max: u16) -> Result<(), ExceptionCode> {
    if qty == 0 || qty > max {
        return Err(ExceptionCode::IllegalDataValue);
    }
    if u32::from(addr) + u32::from(qty) > 0x1_0000 {
        return Err(ExceptionCode::IllegalDataAddress);
    }
    Ok(())
}

fn checked_write_len(addr: u16, len: usize, max: usize) -> Result<u16, ExceptionCode> {
    if len == 0 || len > max {
        return Err(ExceptionCode::IllegalDataValue);
    }
    let qty = len as u16;
    check_range(addr, qty, qty)?;
    Ok(qty)
}

impl tokio_modbus::server::Service for SlaveService {
    type Request = SlaveRequest<'static>;
    type Response = Option<Response>;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        if self.cancel.is_cancelled() {
            // Listener is shutting down; connections still open get a failure
            return future::ready(Err(ExceptionCode::ServerDeviceFailure));
        }
        if !self.accepts(req.slave) {
            trace!("{}: ignoring request for unit {}", self.name, req.slave);
            return future::ready(Ok(None));
        }

        let function = req.request.function_code();
        let result = self.handle(req.request);
        if let Err(code) = &result {
            debug!("{}: {:?} -> exception {:?}", self.name, function, code);
        }
        future::ready(result.map(Some))
    }
}
