// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Packing of multiple data items into PDU-sized requests.
//!
//! A [`BatchPolicy`] decides which items share a request. Every item
//! yields its own [`ItemResult`], in the order of the input, regardless
//! of how the items were grouped.

use std::{borrow::Cow, fmt, ops::Range};

use crate::{
    codec::{
        read_response_item_len, write_request_item_len, DATA_ITEM_HEADER_LEN,
        REQUEST_HEADER_LEN, RESPONSE_HEADER_LEN, VAR_PARAM_HEADER_LEN, VAR_SPEC_LEN,
    },
    frame::{DataItem, ItemResult, ReadItem, Request, Response, WriteItem, MAX_ITEM_COUNT},
    Error, ProtocolError, Result, ReturnCode,
};

use super::Client;

/// Maximum number of items in a single request.
pub const MAX_ITEMS_PER_REQUEST: usize = 20;

/// Bytes of a read response that are not item data.
const READ_CHUNK_OVERHEAD: usize = RESPONSE_HEADER_LEN + VAR_PARAM_HEADER_LEN + DATA_ITEM_HEADER_LEN;

/// Bytes of a write request that are not item data.
const WRITE_CHUNK_OVERHEAD: usize =
    REQUEST_HEADER_LEN + VAR_PARAM_HEADER_LEN + VAR_SPEC_LEN + DATA_ITEM_HEADER_LEN;

/// Limits of a single request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub pdu_length: u16,
    pub max_items: usize,
}

impl Capacity {
    #[must_use]
    pub const fn new(pdu_length: u16) -> Self {
        Self {
            pdu_length,
            max_items: MAX_ITEMS_PER_REQUEST,
        }
    }

    /// Bytes available for variable specifications and data of a request.
    #[must_use]
    pub const fn request_budget(&self) -> usize {
        (self.pdu_length as usize).saturating_sub(REQUEST_HEADER_LEN + VAR_PARAM_HEADER_LEN)
    }

    /// Bytes available for item data of a response.
    #[must_use]
    pub const fn response_budget(&self) -> usize {
        (self.pdu_length as usize).saturating_sub(RESPONSE_HEADER_LEN + VAR_PARAM_HEADER_LEN)
    }

    /// Whether a single item fits into one exchange.
    #[must_use]
    pub const fn fits(&self, cost: ItemCost) -> bool {
        cost.request <= self.request_budget() && cost.response <= self.response_budget()
    }
}

/// Bytes an item occupies in a request and in its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemCost {
    pub request: usize,
    pub response: usize,
}

impl ItemCost {
    #[must_use]
    pub const fn read(item: &DataItem) -> Self {
        Self {
            request: VAR_SPEC_LEN,
            response: read_response_item_len(item.byte_len()),
        }
    }

    #[must_use]
    pub const fn write(item: &DataItem) -> Self {
        Self {
            request: write_request_item_len(item.byte_len()),
            response: 1,
        }
    }
}

/// One exchange (or series of exchanges) of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    /// Consecutive items sent in a single request.
    Packed(Range<usize>),
    /// A single item too large for one PDU, transferred in chunks.
    Chunked(usize),
}

/// Strategy for grouping items into requests.
pub trait BatchPolicy: Send + Sync + fmt::Debug {
    /// Plans the exchanges for items with the given costs.
    ///
    /// The batches must cover every index exactly once and in ascending
    /// order. Each packed batch must stay within the capacity. Otherwise
    /// the plan is discarded in favor of [`Greedy`].
    fn plan(&self, costs: &[ItemCost], capacity: Capacity) -> Vec<Batch>;
}

/// Fills each request in input order until the next item would not fit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl BatchPolicy for Greedy {
    fn plan(&self, costs: &[ItemCost], capacity: Capacity) -> Vec<Batch> {
        let mut plan = Vec::new();
        let mut start = 0;
        let mut request = 0;
        let mut response = 0;
        for (i, cost) in costs.iter().enumerate() {
            if !capacity.fits(*cost) {
                if start < i {
                    plan.push(Batch::Packed(start..i));
                }
                plan.push(Batch::Chunked(i));
                start = i + 1;
                request = 0;
                response = 0;
                continue;
            }
            if i - start >= capacity.max_items
                || request + cost.request > capacity.request_budget()
                || response + cost.response > capacity.response_budget()
            {
                plan.push(Batch::Packed(start..i));
                start = i;
                request = 0;
                response = 0;
            }
            request += cost.request;
            response += cost.response;
        }
        if start < costs.len() {
            plan.push(Batch::Packed(start..costs.len()));
        }
        plan
    }
}

/// Whether the items of a packed batch fit into a single exchange.
fn fits_packed(costs: &[ItemCost], capacity: Capacity) -> bool {
    if costs.len() > capacity.max_items.min(MAX_ITEM_COUNT) {
        return false;
    }
    if !costs.iter().all(|cost| capacity.fits(*cost)) {
        return false;
    }
    let request: usize = costs.iter().map(|cost| cost.request).sum();
    let response: usize = costs.iter().map(|cost| cost.response).sum();
    request <= capacity.request_budget() && response <= capacity.response_budget()
}

fn is_valid_plan(plan: &[Batch], costs: &[ItemCost], capacity: Capacity) -> bool {
    let mut next = 0;
    for batch in plan {
        match batch {
            Batch::Packed(range)
                if range.start == next
                    && range.end > range.start
                    && range.end <= costs.len()
                    && fits_packed(&costs[range.clone()], capacity) =>
            {
                next = range.end;
            }
            // Chunking works for items of any size
            Batch::Chunked(index) if *index == next && *index < costs.len() => next += 1,
            _ => return false,
        }
    }
    next == costs.len()
}

fn make_plan(policy: &dyn BatchPolicy, costs: &[ItemCost], capacity: Capacity) -> Vec<Batch> {
    let plan = policy.plan(costs, capacity);
    if is_valid_plan(&plan, costs, capacity) {
        return plan;
    }
    log::warn!("Discarding invalid batch plan of {policy:?}: {plan:?}");
    Greedy.plan(costs, capacity)
}

/// Rejects items that cannot be addressed or do not match their buffer.
fn check_item(item: &DataItem, actual: usize) -> Result<()> {
    if !item.is_addressable() {
        return Err(Error::address_range(item));
    }
    let required = item.byte_len();
    if required > actual {
        return Err(Error::item_size(required, actual));
    }
    Ok(())
}

/// Index of the first element of the chunk starting `done` elements into `item`.
fn chunk_start(item: &DataItem, done: u16) -> Result<u32> {
    let offset = if item.word_len.is_element_addressed() {
        Some(u32::from(done))
    } else {
        u32::from(done).checked_mul(item.word_len.size() as u32)
    };
    offset
        .and_then(|offset| item.start.checked_add(offset))
        .ok_or_else(|| Error::address_range(item))
}

fn max_chunk_amount(item: &DataItem, max_bytes: usize) -> u16 {
    let amount = (max_bytes / item.word_len.size()).max(1);
    u16::try_from(amount).unwrap_or(u16::MAX)
}

/// Reads a single item, split into as many requests as the PDU length requires.
///
/// `buf` is only modified once all chunks have been received.
pub(crate) async fn read_chunked(
    client: &mut dyn Client,
    item: DataItem,
    buf: &mut [u8],
) -> Result<()> {
    check_item(&item, buf.len())?;
    let mut data = vec![0; item.byte_len()];
    let max_bytes = usize::from(client.pdu_length()).saturating_sub(READ_CHUNK_OVERHEAD);
    let max_amount = max_chunk_amount(&item, max_bytes);
    let unit = item.word_len.size();
    let mut done = 0;
    while done < item.amount {
        let amount = (item.amount - done).min(max_amount);
        let chunk = DataItem {
            start: chunk_start(&item, done)?,
            amount,
            ..item
        };
        let offset = usize::from(done) * unit;
        let len = chunk.byte_len();
        log::trace!("Reading chunk {chunk:?}");
        let rsp = client
            .call(Request::ReadVar(Cow::Owned(vec![chunk])))
            .await?;
        let Response::ReadVar(mut results) = rsp else {
            unreachable!("call() should reject mismatching responses");
        };
        match results.pop() {
            Some(Ok(bytes)) if bytes.len() >= len => {
                data[offset..offset + len].copy_from_slice(&bytes[..len]);
            }
            Some(Ok(_)) => {
                return Err(ProtocolError::Item(ReturnCode::DataSizeMismatch).into());
            }
            Some(Err(code)) => return Err(ProtocolError::Item(code).into()),
            None => unreachable!("call() should reject mismatching item counts"),
        }
        done += amount;
    }
    buf[..data.len()].copy_from_slice(&data);
    Ok(())
}

/// Writes a single item, split into as many requests as the PDU length requires.
pub(crate) async fn write_chunked(
    client: &mut dyn Client,
    item: DataItem,
    data: &[u8],
) -> Result<()> {
    check_item(&item, data.len())?;
    let max_bytes = usize::from(client.pdu_length()).saturating_sub(WRITE_CHUNK_OVERHEAD);
    let max_amount = max_chunk_amount(&item, max_bytes);
    let unit = item.word_len.size();
    let mut done = 0;
    while done < item.amount {
        let amount = (item.amount - done).min(max_amount);
        let chunk = DataItem {
            start: chunk_start(&item, done)?,
            amount,
            ..item
        };
        let offset = usize::from(done) * unit;
        let write = WriteItem::new(chunk, &data[offset..offset + chunk.byte_len()]);
        log::trace!("Writing chunk {chunk:?}");
        let rsp = client
            .call(Request::WriteVar(Cow::Owned(vec![write])))
            .await?;
        let Response::WriteVar(codes) = rsp else {
            unreachable!("call() should reject mismatching responses");
        };
        match codes.first() {
            Some(code) if code.is_success() => {}
            Some(code) => return Err(ProtocolError::Item(*code).into()),
            None => unreachable!("call() should reject mismatching item counts"),
        }
        done += amount;
    }
    Ok(())
}

/// Applies the outcome of an exchange to all items of a batch.
///
/// Transport and framing errors abort the whole operation.
fn fan_out(results: &mut [ItemResult], indices: &[usize], err: Error) -> Result<()> {
    if err.is_fatal() {
        return Err(err);
    }
    for &index in indices {
        let Some(item_err) = err.try_clone() else {
            return Err(err);
        };
        results[index] = Err(item_err);
    }
    Ok(())
}

pub(crate) async fn read_multi(
    client: &mut dyn Client,
    policy: &dyn BatchPolicy,
    items: &mut [ReadItem<'_>],
) -> Result<Vec<ItemResult>> {
    let mut results: Vec<ItemResult> = items
        .iter()
        .map(|read| check_item(&read.item, read.buf.len()))
        .collect();
    let pending: Vec<usize> = (0..items.len()).filter(|&i| results[i].is_ok()).collect();
    let costs: Vec<_> = pending.iter().map(|&i| ItemCost::read(&items[i].item)).collect();
    let plan = make_plan(policy, &costs, Capacity::new(client.pdu_length()));
    log::trace!("Reading {} items in {} batches", pending.len(), plan.len());

    for batch in plan {
        match batch {
            Batch::Chunked(pos) => {
                let read = &mut items[pending[pos]];
                match read_chunked(client, read.item, read.buf).await {
                    Ok(()) => {}
                    Err(err) => fan_out(&mut results, &pending[pos..=pos], err)?,
                }
            }
            Batch::Packed(range) => {
                let indices = &pending[range];
                let specs: Vec<_> = indices.iter().map(|&i| items[i].item).collect();
                let rsp = match client.call(Request::ReadVar(Cow::Owned(specs))).await {
                    Ok(rsp) => rsp,
                    Err(err) => {
                        fan_out(&mut results, indices, err)?;
                        continue;
                    }
                };
                let Response::ReadVar(values) = rsp else {
                    unreachable!("call() should reject mismatching responses");
                };
                for (&index, value) in indices.iter().zip(values) {
                    let read = &mut items[index];
                    let len = read.item.byte_len();
                    results[index] = match value {
                        Ok(bytes) if bytes.len() >= len => {
                            read.buf[..len].copy_from_slice(&bytes[..len]);
                            Ok(())
                        }
                        Ok(_) => Err(ProtocolError::Item(ReturnCode::DataSizeMismatch).into()),
                        Err(code) => Err(ProtocolError::Item(code).into()),
                    };
                }
            }
        }
    }
    Ok(results)
}

pub(crate) async fn write_multi(
    client: &mut dyn Client,
    policy: &dyn BatchPolicy,
    items: &[WriteItem<'_>],
) -> Result<Vec<ItemResult>> {
    let mut results: Vec<ItemResult> = items
        .iter()
        .map(|write| check_item(&write.item, write.data.len()))
        .collect();
    let pending: Vec<usize> = (0..items.len()).filter(|&i| results[i].is_ok()).collect();
    let costs: Vec<_> = pending.iter().map(|&i| ItemCost::write(&items[i].item)).collect();
    let plan = make_plan(policy, &costs, Capacity::new(client.pdu_length()));
    log::trace!("Writing {} items in {} batches", pending.len(), plan.len());

    for batch in plan {
        match batch {
            Batch::Chunked(pos) => {
                let write = &items[pending[pos]];
                match write_chunked(client, write.item, &write.data).await {
                    Ok(()) => {}
                    Err(err) => fan_out(&mut results, &pending[pos..=pos], err)?,
                }
            }
            Batch::Packed(range) => {
                let indices = &pending[range];
                let writes: Vec<_> = indices
                    .iter()
                    .map(|&i| WriteItem::new(items[i].item, items[i].payload()))
                    .collect();
                let rsp = match client.call(Request::WriteVar(Cow::Owned(writes))).await {
                    Ok(rsp) => rsp,
                    Err(err) => {
                        fan_out(&mut results, indices, err)?;
                        continue;
                    }
                };
                let Response::WriteVar(codes) = rsp else {
                    unreachable!("call() should reject mismatching responses");
                };
                for (&index, code) in indices.iter().zip(codes) {
                    results[index] = if code.is_success() {
                        Ok(())
                    } else {
                        Err(ProtocolError::Item(code).into())
                    };
                }
            }
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::padded_len;

    fn read_response_len(lens: &[usize]) -> usize {
        RESPONSE_HEADER_LEN
            + VAR_PARAM_HEADER_LEN
            + lens
                .iter()
                .map(|&len| DATA_ITEM_HEADER_LEN + padded_len(len))
                .sum::<usize>()
    }

    fn read_costs(lens: &[usize]) -> Vec<ItemCost> {
        lens.iter()
            .map(|&len| ItemCost {
                request: VAR_SPEC_LEN,
                response: read_response_item_len(len),
            })
            .collect()
    }

    #[test]
    fn budgets() {
        let capacity = Capacity::new(240);
        assert_eq!(capacity.request_budget(), 228);
        assert_eq!(capacity.response_budget(), 226);
        assert_eq!(READ_CHUNK_OVERHEAD, 18);
        assert_eq!(WRITE_CHUNK_OVERHEAD, 28);
    }

    #[test]
    fn small_items_share_one_request() {
        let plan = Greedy.plan(&read_costs(&[2, 2, 2]), Capacity::new(240));
        assert_eq!(plan, [Batch::Packed(0..3)]);
    }

    #[test]
    fn split_when_response_exceeds_pdu() {
        // 4 + 100 bytes per item, 226 bytes available
        let plan = Greedy.plan(&read_costs(&[100, 100, 100, 100]), Capacity::new(240));
        assert_eq!(plan, [Batch::Packed(0..2), Batch::Packed(2..4)]);
        for batch in &plan {
            let Batch::Packed(range) = batch else {
                unreachable!();
            };
            assert!(read_response_len(&vec![100; range.len()]) <= 240);
        }
    }

    #[test]
    fn split_after_max_items() {
        let plan = Greedy.plan(&read_costs(&[1; 45]), Capacity::new(960));
        assert_eq!(
            plan,
            [
                Batch::Packed(0..20),
                Batch::Packed(20..40),
                Batch::Packed(40..45)
            ]
        );
    }

    #[test]
    fn split_when_request_exceeds_pdu() {
        // 228 bytes available for 12 byte specs
        let plan = Greedy.plan(&read_costs(&[0; 20]), Capacity::new(240));
        assert_eq!(plan, [Batch::Packed(0..19), Batch::Packed(19..20)]);
    }

    #[test]
    fn oversized_items_are_chunked() {
        let plan = Greedy.plan(&read_costs(&[2, 500, 2, 2]), Capacity::new(240));
        assert_eq!(
            plan,
            [Batch::Packed(0..1), Batch::Chunked(1), Batch::Packed(2..4)]
        );
    }

    #[test]
    fn empty_plan() {
        assert!(Greedy.plan(&[], Capacity::new(240)).is_empty());
    }

    #[test]
    fn plans_preserve_order() {
        let lens: Vec<_> = (0..60).map(|i| (i * 37) % 300).collect();
        let costs = read_costs(&lens);
        let plan = Greedy.plan(&costs, Capacity::new(240));
        assert!(is_valid_plan(&plan, &costs, Capacity::new(240)));
    }

    #[test]
    fn invalid_plans_are_detected() {
        let capacity = Capacity::new(240);
        let costs = read_costs(&[2, 2]);
        assert!(!is_valid_plan(&[Batch::Packed(1..2)], &costs, capacity));
        assert!(!is_valid_plan(&[Batch::Packed(0..1)], &costs, capacity));
        assert!(!is_valid_plan(
            &[Batch::Chunked(1), Batch::Packed(0..1)],
            &costs,
            capacity
        ));
        assert!(!is_valid_plan(&[Batch::Packed(0..3)], &costs, capacity));
        assert!(!is_valid_plan(&[Batch::Packed(0..0)], &[], capacity));
        assert!(is_valid_plan(&[], &[], capacity));
        assert!(is_valid_plan(
            &[Batch::Chunked(0), Batch::Chunked(1)],
            &costs,
            capacity
        ));
    }

    #[test]
    fn packed_batches_must_fit_capacity() {
        let capacity = Capacity::new(240);
        // 4 + 100 bytes per item, 226 bytes available
        let costs = read_costs(&[100, 100, 100, 100]);
        assert!(!is_valid_plan(&[Batch::Packed(0..4)], &costs, capacity));
        assert!(is_valid_plan(
            &[Batch::Packed(0..2), Batch::Packed(2..4)],
            &costs,
            capacity
        ));
        // An oversized item cannot be packed, not even alone
        let costs = read_costs(&[500]);
        assert!(!is_valid_plan(&[Batch::Packed(0..1)], &costs, capacity));
        assert!(is_valid_plan(&[Batch::Chunked(0)], &costs, capacity));
        // More than max_items
        let costs = read_costs(&[1; 21]);
        let capacity = Capacity::new(960);
        assert!(!is_valid_plan(&[Batch::Packed(0..21)], &costs, capacity));
        // More than the item count of a request can express
        let costs = vec![
            ItemCost {
                request: 0,
                response: 0
            };
            256
        ];
        let capacity = Capacity {
            pdu_length: 960,
            max_items: 1000,
        };
        assert!(!is_valid_plan(&[Batch::Packed(0..256)], &costs, capacity));
        assert!(is_valid_plan(
            &[Batch::Packed(0..255), Batch::Packed(255..256)],
            &costs,
            capacity
        ));
    }

    #[derive(Debug)]
    struct Broken;

    impl BatchPolicy for Broken {
        fn plan(&self, _: &[ItemCost], _: Capacity) -> Vec<Batch> {
            vec![Batch::Chunked(7)]
        }
    }

    #[test]
    fn invalid_plans_fall_back_to_greedy() {
        let costs = read_costs(&[2, 2]);
        let plan = make_plan(&Broken, &costs, Capacity::new(240));
        assert_eq!(plan, [Batch::Packed(0..2)]);
    }

    #[derive(Debug)]
    struct AllInOne;

    impl BatchPolicy for AllInOne {
        fn plan(&self, costs: &[ItemCost], _: Capacity) -> Vec<Batch> {
            vec![Batch::Packed(0..costs.len())]
        }
    }

    #[test]
    fn overbudget_plans_fall_back_to_greedy() {
        let costs = read_costs(&[100, 100, 100, 100]);
        let plan = make_plan(&AllInOne, &costs, Capacity::new(240));
        assert_eq!(plan, [Batch::Packed(0..2), Batch::Packed(2..4)]);
        // Accepted if within budget
        let costs = read_costs(&[2, 2, 2, 2]);
        let plan = make_plan(&AllInOne, &costs, Capacity::new(240));
        assert_eq!(plan, [Batch::Packed(0..4)]);
    }

    #[test]
    fn write_costs_include_data() {
        let item = DataItem::db_bytes(1, 0, 3);
        assert_eq!(
            ItemCost::write(&item),
            ItemCost {
                request: 12 + 4 + 4,
                response: 1
            }
        );
        // A single write item may carry at most pdu - 28 bytes
        let capacity = Capacity::new(240);
        assert!(capacity.fits(ItemCost::write(&DataItem::db_bytes(1, 0, 212))));
        assert!(!capacity.fits(ItemCost::write(&DataItem::db_bytes(1, 0, 214))));
    }

    #[test]
    fn chunk_offsets() {
        let item = DataItem::db_bytes(1, 10, 500);
        assert_eq!(chunk_start(&item, 222).unwrap(), 232);
        let item = DataItem::new(crate::Area::Timers, crate::WordLen::Timer, 0, 4, 300);
        assert_eq!(chunk_start(&item, 111).unwrap(), 115);
        assert_eq!(max_chunk_amount(&item, 222), 111);
    }

    #[test]
    fn chunk_offsets_do_not_wrap() {
        let item = DataItem::new(
            crate::Area::DataBlocks,
            crate::WordLen::DWord,
            1,
            u32::MAX - 8,
            10,
        );
        assert_eq!(chunk_start(&item, 2).unwrap(), u32::MAX);
        assert!(matches!(
            chunk_start(&item, 3),
            Err(Error::AddressRange { start, amount: 10 }) if start == u32::MAX - 8
        ));
    }

    #[test]
    fn unaddressable_items_are_rejected() {
        let item = DataItem::db_bytes(1, 0x1F_FFFF, 1);
        assert!(check_item(&item, 1).is_ok());
        let item = DataItem::db_bytes(1, 0x1F_FFFF, 2);
        assert!(matches!(
            check_item(&item, 2),
            Err(Error::AddressRange {
                start: 0x1F_FFFF,
                amount: 2
            })
        ));
        // Checked before the buffer size
        let item = DataItem::db_bytes(1, 0x20_0000, 4);
        assert!(matches!(
            check_item(&item, 0),
            Err(Error::AddressRange { .. })
        ));
    }
}
