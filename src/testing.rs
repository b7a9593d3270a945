// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A scripted PLC that answers client requests over an in-memory transport.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use bytes::{BufMut as _, Bytes, BytesMut};
use futures_util::{SinkExt as _, StreamExt as _};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task::JoinHandle,
};
use tokio_util::codec::Framed;

use crate::{
    client::{Client as _, Context},
    codec::{
        encode_response_adu, encode_user_data_error, padded_len,
        tpkt::{ServerCodec, ServerFrame},
        userdata::{
            tests::{encode_block_info, encode_text},
            SZL_ID_COMPONENT_IDENTIFICATION, SZL_ID_CPU_STATUS,
        },
        write_request_item_len, DATA_ITEM_HEADER_LEN, REQUEST_HEADER_LEN, RESPONSE_HEADER_LEN,
        VAR_PARAM_HEADER_LEN, VAR_SPEC_LEN,
    },
    frame::{tpkt::*, *},
    service, Config, Result,
};

/// Days since 1984-01-01 reported as the code date of every block.
const BLOCK_CODE_DAYS: u16 = 12440;

const SZL_RECORD_LEN_CPU_INFO: u16 = 34;
const SZL_RECORD_LEN_STATUS: u16 = 20;

pub(crate) type RequestLog = Arc<Mutex<Vec<Request<'static>>>>;

#[derive(Debug)]
pub(crate) struct Plc {
    /// Largest PDU length the PLC accepts during negotiation.
    pub(crate) max_pdu_length: u16,
    /// Maximum payload of a COTP data TPDU.
    pub(crate) max_fragment_len: Option<usize>,
    /// Maximum payload of a single user data response.
    pub(crate) user_data_fragment_len: usize,
    /// Stop answering after the PDU length negotiation.
    pub(crate) mute: bool,
    pub(crate) status: u8,
    pub(crate) data_blocks: HashMap<u16, Vec<u8>>,
    pub(crate) merkers: Vec<u8>,
    pub(crate) blocks: Vec<(BlockType, u16)>,
    pub(crate) cpu_info: Vec<(u16, &'static str)>,
    pub(crate) requests: RequestLog,
    pdu_length: u16,
    sequence: u8,
    pending: VecDeque<Bytes>,
}

impl Default for Plc {
    fn default() -> Self {
        Self {
            max_pdu_length: 240,
            max_fragment_len: None,
            user_data_fragment_len: 200,
            mute: false,
            status: 0x08,
            data_blocks: HashMap::new(),
            merkers: vec![0; 64],
            blocks: Vec::new(),
            cpu_info: vec![
                (0x0001, "S7-300 station"),
                (0x0002, "CPU 315-2 PN/DP"),
                (0x0003, ""),
                (0x0004, "Original Siemens Equipment"),
                (0x0005, "S C-X4U421302009"),
                (0x0007, "CPU 315-2 PN/DP"),
            ],
            requests: RequestLog::default(),
            pdu_length: 0,
            sequence: 0,
            pending: VecDeque::new(),
        }
    }
}

impl Plc {
    pub(crate) fn with_data_block(mut self, number: u16, len: usize) -> Self {
        self.data_blocks.insert(number, vec![0; len]);
        self.blocks.push((BlockType::DB, number));
        self
    }

    pub(crate) fn with_block(mut self, block_type: BlockType, number: u16) -> Self {
        self.blocks.push((block_type, number));
        self
    }

    /// Answers requests until the client closes the transport.
    pub(crate) async fn serve<T>(mut self, transport: T) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(
            transport,
            ServerCodec {
                max_fragment_len: self.max_fragment_len,
            },
        );
        while let Some(frame) = framed.next().await {
            match frame? {
                ServerFrame::Connect(_) => {
                    framed
                        .send(ConnectConfirm {
                            dst_ref: 0x0001,
                            src_ref: 0x0002,
                        })
                        .await?;
                }
                ServerFrame::Data(adu) => {
                    let hdr = adu.hdr;
                    let request: Request<'static> = adu.into();
                    if self.mute && self.pdu_length > 0 {
                        continue;
                    }
                    self.requests.lock().unwrap().push(request.clone());
                    let mut buf = BytesMut::new();
                    match (self.respond(&request), request.user_function()) {
                        (Ok(response), _) => {
                            let adu = ResponseAdu {
                                hdr,
                                pdu: response.into(),
                            };
                            encode_response_adu(&mut buf, &adu);
                        }
                        (Err(code), Some(function)) => {
                            encode_user_data_error(&mut buf, hdr, function, code);
                        }
                        (Err(code), None) => {
                            let adu = ResponseAdu {
                                hdr,
                                pdu: code.into(),
                            };
                            encode_response_adu(&mut buf, &adu);
                        }
                    }
                    framed.send(buf.freeze()).await?;
                }
            }
        }
        Ok(())
    }

    fn respond(&mut self, request: &Request<'_>) -> Result<Response, ErrorCode> {
        match request {
            Request::SetupCommunication {
                max_amq_calling,
                max_amq_called,
                pdu_length,
            } => {
                self.pdu_length = (*pdu_length).min(self.max_pdu_length);
                Ok(Response::SetupCommunication {
                    max_amq_calling: *max_amq_calling,
                    max_amq_called: *max_amq_called,
                    pdu_length: self.pdu_length,
                })
            }
            Request::ReadVar(items) => {
                let request_len =
                    REQUEST_HEADER_LEN + VAR_PARAM_HEADER_LEN + items.len() * VAR_SPEC_LEN;
                let response_len = RESPONSE_HEADER_LEN
                    + VAR_PARAM_HEADER_LEN
                    + items
                        .iter()
                        .map(|item| DATA_ITEM_HEADER_LEN + padded_len(item.byte_len()))
                        .sum::<usize>();
                self.check_pdu_len(request_len.max(response_len))?;
                let values = items
                    .iter()
                    .map(|item| {
                        self.memory(item)
                            .map(|memory| Bytes::copy_from_slice(memory))
                    })
                    .collect();
                Ok(Response::ReadVar(values))
            }
            Request::WriteVar(items) => {
                let request_len = REQUEST_HEADER_LEN
                    + VAR_PARAM_HEADER_LEN
                    + items
                        .iter()
                        .map(|write| write_request_item_len(write.data.len()))
                        .sum::<usize>();
                self.check_pdu_len(request_len)?;
                let codes = items
                    .iter()
                    .map(|write| match self.memory(&write.item) {
                        Ok(memory) if memory.len() == write.data.len() => {
                            memory.copy_from_slice(&write.data);
                            ReturnCode::Success
                        }
                        Ok(_) => ReturnCode::DataSizeMismatch,
                        Err(code) => code,
                    })
                    .collect();
                Ok(Response::WriteVar(codes))
            }
            Request::ReadSzl { id, index } => {
                let payload = self.szl(*id, *index)?;
                Ok(self.fragmented(UserFunction::ReadSzl, payload))
            }
            Request::ListBlocks => {
                let mut payload = BytesMut::new();
                for block_type in BlockType::ALL {
                    let count = self.blocks.iter().filter(|(t, _)| *t == block_type).count();
                    payload.put_u8(0x30);
                    payload.put_u8(block_type.value());
                    payload.put_u16(u16::try_from(count).unwrap());
                }
                Ok(self.fragmented(UserFunction::ListBlocks, payload.freeze()))
            }
            Request::ListBlocksOfType(block_type) => {
                let mut payload = BytesMut::new();
                for (_, number) in self.blocks.iter().filter(|(t, _)| t == block_type) {
                    payload.put_u16(*number);
                    payload.put_slice(&[0x22, 0x05]);
                }
                if payload.is_empty() {
                    return Ok(Response::UserData(UserData {
                        function: UserFunction::ListBlocksOfType,
                        sequence: 0,
                        last: true,
                        return_code: ReturnCode::ObjectDoesNotExist,
                        payload: Bytes::new(),
                    }));
                }
                Ok(self.fragmented(UserFunction::ListBlocksOfType, payload.freeze()))
            }
            Request::BlockInfo { block_type, number } => {
                if !self.blocks.contains(&(*block_type, *number)) {
                    return Err(ErrorCode::ITEM_NOT_AVAILABLE);
                }
                let payload = encode_block_info(*block_type, *number, BLOCK_CODE_DAYS);
                Ok(self.fragmented(UserFunction::BlockInfo, payload))
            }
            Request::Continue { function, sequence } => {
                if *sequence != self.sequence {
                    return Err(ErrorCode::new(0xD0A1));
                }
                let payload = self.pending.pop_front().ok_or(ErrorCode::new(0xD0A1))?;
                Ok(Response::UserData(UserData {
                    function: *function,
                    sequence: self.sequence,
                    last: self.pending.is_empty(),
                    return_code: ReturnCode::Success,
                    payload,
                }))
            }
        }
    }

    fn check_pdu_len(&self, len: usize) -> Result<(), ErrorCode> {
        if len > usize::from(self.pdu_length) {
            return Err(ErrorCode::DATA_EXCEEDS_PDU);
        }
        Ok(())
    }

    fn memory(&mut self, item: &DataItem) -> Result<&mut [u8], ReturnCode> {
        if item.word_len.is_element_addressed() {
            return Err(ReturnCode::DataTypeNotSupported);
        }
        let memory = match item.area {
            Area::DataBlocks => self
                .data_blocks
                .get_mut(&item.db_number)
                .ok_or(ReturnCode::ObjectDoesNotExist)?,
            Area::Merkers => &mut self.merkers,
            _ => return Err(ReturnCode::AccessDenied),
        };
        let start = item.start as usize;
        let end = start + item.byte_len();
        memory
            .get_mut(start..end)
            .ok_or(ReturnCode::AddressOutOfRange)
    }

    fn szl(&self, id: u16, index: u16) -> Result<Bytes, ErrorCode> {
        let mut payload = BytesMut::new();
        payload.put_u16(id);
        payload.put_u16(index);
        match id {
            SZL_ID_COMPONENT_IDENTIFICATION => {
                payload.put_u16(SZL_RECORD_LEN_CPU_INFO);
                payload.put_u16(u16::try_from(self.cpu_info.len()).unwrap());
                for (index, text) in &self.cpu_info {
                    payload.put_u16(*index);
                    encode_text(&mut payload, text, 32);
                }
            }
            SZL_ID_CPU_STATUS => {
                payload.put_u16(SZL_RECORD_LEN_STATUS);
                payload.put_u16(1);
                let mut record = [0; SZL_RECORD_LEN_STATUS as usize];
                record[3] = self.status;
                payload.put_slice(&record);
            }
            _ => return Err(ErrorCode::INVALID_SZL_ID),
        }
        Ok(payload.freeze())
    }

    /// Splits a user data payload into fragments and returns the first one.
    fn fragmented(&mut self, function: UserFunction, payload: Bytes) -> Response {
        self.sequence = self.sequence.wrapping_add(1);
        let len = self.user_data_fragment_len.max(1);
        let mut fragments: VecDeque<_> = (0..payload.len())
            .step_by(len)
            .map(|start| payload.slice(start..payload.len().min(start + len)))
            .collect();
        let first = fragments.pop_front().unwrap_or_default();
        self.pending = fragments;
        Response::UserData(UserData {
            function,
            sequence: self.sequence,
            last: self.pending.is_empty(),
            return_code: ReturnCode::Success,
            payload: first,
        })
    }
}

/// Connects a client to `plc` over an in-memory transport.
pub(crate) async fn connect(plc: Plc, config: &Config) -> (Context, JoinHandle<Result<()>>) {
    let (client, server) = tokio::io::duplex(4096);
    let server = tokio::spawn(plc.serve(server));
    let client = service::tcp::Client::connect(client, config).await.unwrap();
    let context = Context::from(Box::new(client) as Box<dyn crate::client::Client>);
    assert_eq!(context.state(), crate::State::Ready);
    (context, server)
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, io, time::Duration};

    use crate::{
        client::{Diagnostics as _, Reader as _, Writer as _},
        Error, ProtocolError, State,
    };

    use super::*;

    const DB_A: u16 = 2710;
    const DB_B: u16 = 2810;
    const DB_C: u16 = 2910;

    fn plc() -> Plc {
        Plc::default()
            .with_data_block(DB_A, 1024)
            .with_data_block(DB_B, 1024)
            .with_data_block(DB_C, 1024)
    }

    #[tokio::test]
    async fn negotiate_pdu_length() {
        let (context, _) = connect(plc(), &Config::default()).await;
        assert_eq!(context.pdu_length(), 240);
    }

    #[tokio::test]
    async fn connect_rejected_with_zero_pdu_length() {
        let plc = Plc {
            max_pdu_length: 0,
            ..plc()
        };
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(plc.serve(server));
        let err = service::tcp::Client::connect(client, &Config::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::ConnectionRejected(_))
        ));
    }

    #[tokio::test]
    async fn write_then_read_word() {
        let (mut context, _) = connect(plc(), &Config::default()).await;
        context
            .write_db(DB_A, 8, 2, &100u16.to_be_bytes())
            .await
            .unwrap();
        let mut buf = [0; 2];
        context.read_db(DB_A, 8, 2, &mut buf).await.unwrap();
        assert_eq!(u16::from_be_bytes(buf), 100);
    }

    #[tokio::test]
    async fn independent_multi_items() {
        let (mut context, _) = connect(plc(), &Config::default()).await;
        let writes = [
            WriteItem::new(DataItem::db_bytes(DB_A, 0, 16), vec![0x01; 16]),
            WriteItem::new(DataItem::db_bytes(DB_B, 0, 16), vec![0x02; 16]),
        ];
        let results = context.write_multi(&writes).await.unwrap();
        assert!(results.iter().all(Result::is_ok));

        let mut a = [0; 2];
        let mut b = [0; 2];
        let mut c = [0; 2];
        let word = |db_number| DataItem::new(Area::DataBlocks, WordLen::Word, db_number, 8, 1);
        let mut reads = [
            ReadItem::new(word(DB_A), &mut a),
            ReadItem::new(word(DB_B), &mut b),
            ReadItem::new(word(DB_C), &mut c),
        ];
        let results = context.read_multi(&mut reads).await.unwrap();
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(u16::from_be_bytes(a), 257);
        assert_eq!(u16::from_be_bytes(b), 514);
        assert_eq!(u16::from_be_bytes(c), 0);
    }

    #[tokio::test]
    async fn multi_item_errors_stay_with_their_item() {
        let (mut context, _) = connect(plc(), &Config::default()).await;
        let mut a = [0; 4];
        let mut missing = [0; 4];
        let mut out_of_range = [0; 4];
        let mut reads = [
            ReadItem::new(DataItem::db_bytes(DB_A, 0, 4), &mut a),
            ReadItem::new(DataItem::db_bytes(1, 0, 4), &mut missing),
            ReadItem::new(DataItem::db_bytes(DB_B, 1022, 4), &mut out_of_range),
        ];
        let results = context.read_multi(&mut reads).await.unwrap();
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(Error::Protocol(ProtocolError::Item(
                ReturnCode::ObjectDoesNotExist
            )))
        ));
        assert!(matches!(
            results[2],
            Err(Error::Protocol(ProtocolError::Item(
                ReturnCode::AddressOutOfRange
            )))
        ));
        assert_eq!(context.state(), State::Ready);
    }

    #[tokio::test]
    async fn split_transparency() {
        let plc = plc();
        let requests = Arc::clone(&plc.requests);
        let (mut context, _) = connect(plc, &Config::default()).await;

        let pattern: Vec<u8> = (0..=255).collect();
        context.write_db(DB_A, 0, 256, &pattern).await.unwrap();
        context.write_db(DB_B, 0, 256, &pattern).await.unwrap();

        let items: Vec<_> = (0..12u32)
            .map(|i| {
                let db_number = if i % 2 == 0 { DB_A } else { DB_B };
                DataItem::db_bytes(db_number, i * 7, 60)
            })
            .collect();

        let mut batched = vec![[0; 60]; items.len()];
        requests.lock().unwrap().clear();
        let batched_results = {
            let mut reads: Vec<_> = items
                .iter()
                .zip(batched.iter_mut())
                .map(|(item, buf)| ReadItem::new(*item, buf))
                .collect();
            context.read_multi(&mut reads).await.unwrap()
        };
        // 12 * 64 response bytes do not fit into a PDU of 240 bytes
        assert!(requests.lock().unwrap().len() > 1);

        let mut single = vec![[0; 60]; items.len()];
        for (item, buf) in items.iter().zip(single.iter_mut()) {
            let mut reads = [ReadItem::new(*item, buf)];
            let results = context.read_multi(&mut reads).await.unwrap();
            assert!(results[0].is_ok());
        }
        assert!(batched_results.iter().all(Result::is_ok));
        assert_eq!(batched, single);
    }

    #[tokio::test]
    async fn oversized_items_in_multi_read() {
        let (mut context, _) = connect(plc(), &Config::default()).await;
        let data: Vec<u8> = (0..600).map(|i| (i % 251) as u8).collect();
        context.write_db(DB_C, 0, 600, &data).await.unwrap();
        let mut small = [0; 2];
        let mut large = vec![0; 600];
        let mut reads = [
            ReadItem::new(DataItem::db_bytes(DB_C, 0, 2), &mut small),
            ReadItem::new(DataItem::db_bytes(DB_C, 0, 600), &mut large),
        ];
        let results = context.read_multi(&mut reads).await.unwrap();
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(small, data[..2]);
        assert_eq!(large, data);
    }

    #[tokio::test]
    async fn failed_chunked_read_leaves_buffer_untouched() {
        let (mut context, _) = connect(plc(), &Config::default()).await;
        context.write_db(DB_A, 800, 4, &[0xAA; 4]).await.unwrap();
        // The first chunk succeeds, the second one ends beyond the DB
        let mut buf = vec![0x55; 300];
        let err = context.read_db(DB_A, 800, 300, &mut buf).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::Item(ReturnCode::AddressOutOfRange))
        ));
        assert!(buf.iter().all(|&b| b == 0x55));
        assert_eq!(context.state(), State::Ready);
    }

    #[tokio::test]
    async fn unaddressable_requests_are_not_sent() {
        let plc = plc();
        let requests = Arc::clone(&plc.requests);
        let (mut context, _) = connect(plc, &Config::default()).await;
        requests.lock().unwrap().clear();

        let write = WriteItem::new(DataItem::db_bytes(DB_A, 0x20_0000, 2), vec![0; 2]);
        let err = context
            .call(Request::WriteVar(Cow::Owned(vec![write])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AddressRange { .. }));

        let items = vec![DataItem::db_bytes(DB_A, 0, 1); 256];
        let err = context
            .call(Request::ReadVar(Cow::Owned(items)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooManyItems(256)));

        assert!(requests.lock().unwrap().is_empty());
        assert_eq!(context.state(), State::Ready);
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected_by_the_plc() {
        let plc = plc();
        let (mut context, _) = connect(plc, &Config::default()).await;
        let items: Vec<_> = (0..4).map(|i| DataItem::db_bytes(DB_A, i * 100, 100)).collect();
        let err = context
            .call(Request::ReadVar(Cow::Owned(items)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::Rejected(ErrorCode::DATA_EXCEEDS_PDU))
        ));
        assert_eq!(context.state(), State::Ready);
    }

    #[tokio::test]
    async fn fragmented_transport() {
        let plc = Plc {
            max_fragment_len: Some(16),
            ..plc()
        };
        let (mut context, _) = connect(plc, &Config::default()).await;
        let data = [0xAB; 100];
        context.write_db(DB_B, 0, 100, &data).await.unwrap();
        let mut buf = [0; 100];
        context.read_db(DB_B, 0, 100, &mut buf).await.unwrap();
        assert_eq!(buf, data);
    }

    #[tokio::test]
    async fn cpu_info_across_fragments() {
        let plc = Plc {
            user_data_fragment_len: 50,
            ..plc()
        };
        let requests = Arc::clone(&plc.requests);
        let (mut context, _) = connect(plc, &Config::default()).await;
        let info = context.get_cpu_info().await.unwrap();
        assert_eq!(info.as_name, "S7-300 station");
        assert_eq!(info.module_type_name, "CPU 315-2 PN/DP");
        assert_eq!(info.serial_number, "S C-X4U421302009");
        assert_eq!(info.copyright, "Original Siemens Equipment");
        assert_eq!(info.plant_id, "");
        // 8 + 6 * 34 payload bytes in fragments of 50 bytes
        let continuations = requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| matches!(request, Request::Continue { .. }))
            .count();
        assert_eq!(continuations, 4);
    }

    #[tokio::test]
    async fn status_mapping() {
        for (status, expected) in [
            (0x08, PlcStatus::Running),
            (0x04, PlcStatus::Stopped),
            (0x00, PlcStatus::Unknown),
        ] {
            let plc = Plc { status, ..plc() };
            let (mut context, _) = connect(plc, &Config::default()).await;
            assert_eq!(context.get_status().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn read_unknown_szl() {
        let (mut context, _) = connect(plc(), &Config::default()).await;
        let err = context.read_szl(0x0F0F, 0).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::Rejected(ErrorCode::INVALID_SZL_ID))
        ));
        assert_eq!(context.state(), State::Ready);
    }

    #[tokio::test]
    async fn list_blocks() {
        let plc = plc()
            .with_block(BlockType::OB, 1)
            .with_block(BlockType::OB, 100)
            .with_block(BlockType::FC, 5);
        let (mut context, _) = connect(plc, &Config::default()).await;
        let list = context.list_blocks().await.unwrap();
        assert_eq!(list.count(BlockType::OB), 2);
        assert_eq!(list.count(BlockType::DB), 3);
        assert_eq!(list.count(BlockType::FC), 1);
        assert_eq!(list.count(BlockType::SFB), 0);
    }

    #[tokio::test]
    async fn list_blocks_of_type() {
        let mut plc = Plc {
            user_data_fragment_len: 40,
            ..plc()
        };
        for number in 1..=30 {
            plc = plc.with_block(BlockType::FB, number);
        }
        let (mut context, _) = connect(plc, &Config::default()).await;
        let numbers = context.list_blocks_of_type(BlockType::FB).await.unwrap();
        assert_eq!(numbers, (1..=30).collect::<Vec<_>>());
        let numbers = context.list_blocks_of_type(BlockType::DB).await.unwrap();
        assert_eq!(numbers, [DB_A, DB_B, DB_C]);
        assert!(context
            .list_blocks_of_type(BlockType::SDB)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn block_info() {
        let (mut context, _) = connect(plc(), &Config::default()).await;
        let info = context.get_block_info(BlockType::DB, DB_B).await.unwrap();
        assert_eq!(info.block_type, BlockType::DB);
        assert_eq!(info.number, DB_B);
        assert_eq!(
            info.code_date,
            chrono::NaiveDate::from_ymd_opt(2018, 1, 22).unwrap()
        );
        let err = context
            .get_block_info(BlockType::FB, 42)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::BlockNotFound {
                block_type: BlockType::FB,
                number: 42
            })
        ));
    }

    #[tokio::test]
    async fn request_timeout_disconnects() {
        let plc = Plc {
            mute: true,
            ..plc()
        };
        let config = Config::default().with_request_timeout(Duration::from_millis(50));
        let (mut context, _) = connect(plc, &config).await;
        let mut buf = [0; 2];
        let err = context.read_db(DB_A, 0, 2, &mut buf).await.unwrap_err();
        assert!(matches!(&err, Error::Transport(err) if err.kind() == io::ErrorKind::TimedOut));
        assert_eq!(context.state(), State::Disconnected);
        let err = context.read_db(DB_A, 0, 2, &mut buf).await.unwrap_err();
        assert!(matches!(&err, Error::Transport(err) if err.kind() == io::ErrorKind::NotConnected));
    }

    #[tokio::test]
    async fn idle_timeout_disconnects() {
        let config = Config::default().with_idle_timeout(Duration::from_millis(50));
        let (mut context, server) = connect(plc(), &config).await;
        let mut buf = [0; 2];
        context.read_db(DB_A, 0, 2, &mut buf).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(context.state(), State::Disconnected);
        let err = context.read_db(DB_A, 0, 2, &mut buf).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        // The PLC observes the closed transport
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn close_twice() {
        let (mut context, server) = connect(plc(), &Config::default()).await;
        context.disconnect().await.unwrap();
        assert_eq!(context.state(), State::Closed);
        context.disconnect().await.unwrap();
        assert_eq!(context.state(), State::Closed);
        let mut buf = [0; 2];
        let err = context.read_db(DB_A, 0, 2, &mut buf).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(context.state(), State::Closed);
        server.await.unwrap().unwrap();
    }
}
