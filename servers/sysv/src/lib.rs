// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! The SysV service (spec §4.5, component F): bounded message queues and
//! counting semaphores with POSIX `semop` batch semantics, grounded on
//! `original_source/src/sys/pm/sysv/msg/buffer.c`'s ring-buffer `msgbuf`
//! and `include/nanvix/servers/sysv.h`'s `IPC_*` flag set.
//!
//! Blocking is modeled without real threads (spec §5/§9): a caller whose
//! request cannot complete immediately is recorded on a FIFO wait list
//! together with an opaque token `T` supplied by the wire-protocol layer
//! (in this workspace, the request's [`MessageHeader`](nvx_ipc::MessageHeader),
//! which is everything needed to address a delayed reply). The store
//! itself never sends anything; it only reports, from the paired
//! operation, which parked tokens are now satisfied and with what
//! result, via [`Completion`]. The caller (`runtime::sysv::serve`) is the
//! only thing that turns a `Completion` into an actual reply message.

use std::collections::VecDeque;

use bitflags::bitflags;
use nvx_base::limits::{NANVIX_MSG_LENGTH_MAX, NANVIX_MSG_MAX, NANVIX_MSG_SIZE_MAX, NANVIX_SEM_MAX};
use nvx_base::{Code, Error, Result};

bitflags! {
    /// `IPC_*` request flags (spec §4.5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IpcFlags: u32 {
        /// Create the object if it does not already exist.
        const CREAT = 1 << 0;
        /// Combined with `CREAT`, fail with `EEXIST` if it already exists.
        const EXCL  = 1 << 1;
        /// Fail immediately instead of blocking.
        const NOWAIT = 1 << 2;
    }
}

/// Whether a request that might block completed right away or was parked.
///
/// A [`Outcome::Parked`] request must not be replied to: its token has
/// been recorded on a wait list and will surface later, paired with its
/// result, in some future call's `Vec<Completion<T, _>>`.
#[derive(Debug)]
pub enum Outcome<R> {
    Ready(R),
    Parked,
}

/// A parked request that a paired operation has just unblocked. `token`
/// is whatever the wire layer handed in when the request was parked;
/// `result` is that request's own return value, computed now.
#[derive(Debug)]
pub struct Completion<T, R> {
    pub token: T,
    pub result: R,
}

/// A single queued SysV message (spec §4.5: "type-tagged byte payload").
#[derive(Debug, Clone)]
pub struct Message {
    pub mtype: i64,
    pub data: Vec<u8>,
}

struct MsgQueue<T> {
    key: i32,
    messages: VecDeque<Message>,
    /// Receivers parked on an empty (or type-mismatched) queue, each
    /// carrying the `mtype` filter it's waiting on, FIFO.
    recv_waiters: VecDeque<(T, i64)>,
    /// Senders parked on a full ring, carrying the message they still
    /// need to enqueue, FIFO.
    send_waiters: VecDeque<(T, Message)>,
}

/// The message-queue half of the SysV server (spec §4.5: "`msgget`,
/// `msgsnd`, `msgrcv`, `msgctl`" family, named here `msg_get`/`msg_send`/
/// `msg_receive`/`msg_close`). Generic over `T`, the opaque per-waiter
/// reply token the wire layer supplies and later collects via
/// [`Completion`].
pub struct MsgQueueStore<T> {
    queues: Vec<Option<MsgQueue<T>>>,
}

impl<T> Default for MsgQueueStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MsgQueueStore<T> {
    pub fn new() -> Self {
        MsgQueueStore {
            queues: (0..NANVIX_MSG_MAX).map(|_| None).collect(),
        }
    }

    fn find(&self, key: i32) -> Option<usize> {
        self.queues
            .iter()
            .position(|q| q.as_ref().is_some_and(|q| q.key == key))
    }

    /// `msg_get(key, flags)`: returns the id of the queue bound to `key`,
    /// creating it under `CREAT`/`EXCL` rules identical to `LINK`'s peer
    /// in the Name service.
    pub fn msg_get(&mut self, key: i32, flags: IpcFlags) -> Result<usize> {
        if let Some(id) = self.find(key) {
            if flags.contains(IpcFlags::CREAT) && flags.contains(IpcFlags::EXCL) {
                return Err(Error::new(Code::Exists));
            }
            return Ok(id);
        }
        if !flags.contains(IpcFlags::CREAT) {
            return Err(Error::new(Code::NoEnt));
        }
        let id = self
            .queues
            .iter()
            .position(|q| q.is_none())
            .ok_or_else(|| Error::new(Code::NoSpace))?;
        self.queues[id] = Some(MsgQueue {
            key,
            messages: VecDeque::new(),
            recv_waiters: VecDeque::new(),
            send_waiters: VecDeque::new(),
        });
        Ok(id)
    }

    fn queue_mut(&mut self, id: usize) -> Result<&mut MsgQueue<T>> {
        self.queues
            .get_mut(id)
            .and_then(|q| q.as_mut())
            .ok_or_else(|| Error::new(Code::Inval))
    }

    /// `msg_send(id, message, flags, token)`: `ENOSPC` when the ring is
    /// full and `IPC_NOWAIT` is set; otherwise, on a full ring, `token`
    /// is parked as a send-waiter until a `msg_receive` frees a slot
    /// (spec §4.5/§7/§8: "otherwise blocks the caller").
    ///
    /// A message handed directly to an already-parked receiver never
    /// touches the ring at all, matching FIFO delivery order from the
    /// receivers' point of view.
    pub fn msg_send(
        &mut self,
        id: usize,
        message: Message,
        flags: IpcFlags,
        token: T,
    ) -> Result<(Outcome<()>, Vec<Completion<T, (i64, Vec<u8>)>>)> {
        if message.data.len() > NANVIX_MSG_SIZE_MAX {
            return Err(Error::new(Code::Inval));
        }
        let q = self.queue_mut(id)?;

        if let Some(pos) = q
            .recv_waiters
            .iter()
            .position(|(_, want)| *want == 0 || *want == message.mtype)
        {
            let (recv_token, _) = q.recv_waiters.remove(pos).expect("pos came from this deque");
            return Ok((
                Outcome::Ready(()),
                vec![Completion {
                    token: recv_token,
                    result: (message.mtype, message.data),
                }],
            ));
        }

        if q.messages.len() < NANVIX_MSG_LENGTH_MAX {
            q.messages.push_back(message);
            return Ok((Outcome::Ready(()), vec![]));
        }

        if flags.contains(IpcFlags::NOWAIT) {
            return Err(Error::new(Code::NoSpace));
        }
        q.send_waiters.push_back((token, message));
        Ok((Outcome::Parked, vec![]))
    }

    /// `msg_receive(id, mtype, flags, token)`: `mtype == 0` takes the
    /// head of the queue regardless of type (mirrors `msgbuf_get`'s FIFO
    /// order); a non-zero `mtype` takes the first message that matches
    /// it. `ENOMSG` when nothing matches and `IPC_NOWAIT` is set;
    /// otherwise `token` is parked until a matching `msg_send` arrives.
    ///
    /// Dequeuing a message frees one ring slot, which may unblock the
    /// oldest parked sender; that sender's message is pushed onto the
    /// ring in its place and its token surfaces in the returned
    /// completions.
    pub fn msg_receive(
        &mut self,
        id: usize,
        mtype: i64,
        flags: IpcFlags,
        token: T,
    ) -> Result<(Outcome<(i64, Vec<u8>)>, Vec<Completion<T, ()>>)> {
        let q = self.queue_mut(id)?;
        let pos = if mtype == 0 {
            if q.messages.is_empty() {
                None
            }
            else {
                Some(0)
            }
        }
        else {
            q.messages.iter().position(|m| m.mtype == mtype)
        };

        if let Some(i) = pos {
            let msg = q.messages.remove(i).expect("pos came from this deque");
            let mut completions = Vec::new();
            if let Some((send_token, pending)) = q.send_waiters.pop_front() {
                q.messages.push_back(pending);
                completions.push(Completion { token: send_token, result: () });
            }
            return Ok((Outcome::Ready((msg.mtype, msg.data)), completions));
        }

        if flags.contains(IpcFlags::NOWAIT) {
            return Err(Error::new(Code::NoMsg));
        }
        q.recv_waiters.push_back((token, mtype));
        Ok((Outcome::Parked, vec![]))
    }

    /// `msg_close(id)`: releases the queue and everything still queued
    /// on it. Any still-parked waiters are dropped unreplied, the same
    /// as a connection-teardown cleanup would (spec doesn't define a
    /// queue-close-while-blocked handshake).
    pub fn msg_close(&mut self, id: usize) -> Result<()> {
        let slot = self.queues.get_mut(id).ok_or_else(|| Error::new(Code::Inval))?;
        if slot.is_none() {
            return Err(Error::new(Code::Inval));
        }
        *slot = None;
        Ok(())
    }
}

/// A single `semop` batch operation (spec §4.5: POSIX `struct sembuf`).
#[derive(Debug, Clone, Copy)]
pub struct SemOp {
    pub sem_num: usize,
    pub sem_op: i32,
    pub sem_flg: IpcFlags,
}

struct SemSet<T> {
    key: i32,
    values: Vec<u16>,
    /// Batches parked because applying them would have driven some
    /// semaphore negative, or because a zero-wait op's semaphore wasn't
    /// zero yet, FIFO (spec §3: `{ value, wait_queue }` per semaphore
    /// set).
    wait_queue: VecDeque<(T, Vec<SemOp>)>,
}

/// The semaphore half of the SysV server (spec §4.5: "`semget`, `semop`,
/// `semctl`"). Generic over `T` for the same reason as [`MsgQueueStore`].
pub struct SemaphoreStore<T> {
    sets: Vec<Option<SemSet<T>>>,
}

impl<T> Default for SemaphoreStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SemaphoreStore<T> {
    pub fn new() -> Self {
        SemaphoreStore {
            sets: (0..NANVIX_SEM_MAX).map(|_| None).collect(),
        }
    }

    fn find(&self, key: i32) -> Option<usize> {
        self.sets
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.key == key))
    }

    /// `sem_get(key, nsems, flags)`.
    pub fn sem_get(&mut self, key: i32, nsems: usize, flags: IpcFlags) -> Result<usize> {
        if let Some(id) = self.find(key) {
            if flags.contains(IpcFlags::CREAT) && flags.contains(IpcFlags::EXCL) {
                return Err(Error::new(Code::Exists));
            }
            return Ok(id);
        }
        if !flags.contains(IpcFlags::CREAT) {
            return Err(Error::new(Code::NoEnt));
        }
        if nsems == 0 {
            return Err(Error::new(Code::Inval));
        }
        let id = self
            .sets
            .iter()
            .position(|s| s.is_none())
            .ok_or_else(|| Error::new(Code::NoSpace))?;
        self.sets[id] = Some(SemSet {
            key,
            values: vec![0; nsems],
            wait_queue: VecDeque::new(),
        });
        Ok(id)
    }

    fn set_ref(&self, id: usize) -> Result<&SemSet<T>> {
        self.sets
            .get(id)
            .and_then(|s| s.as_ref())
            .ok_or_else(|| Error::new(Code::Inval))
    }

    pub fn get_value(&self, id: usize, sem_num: usize) -> Result<u16> {
        let set = self.set_ref(id)?;
        set.values.get(sem_num).copied().ok_or_else(|| Error::new(Code::Inval))
    }

    fn set_mut(&mut self, id: usize) -> Result<&mut SemSet<T>> {
        self.sets.get_mut(id).and_then(|s| s.as_mut()).ok_or_else(|| Error::new(Code::Inval))
    }

    /// Checks whether every op in `ops` could apply without taking any
    /// semaphore negative and without a zero-wait op seeing a non-zero
    /// value, without mutating state (spec §4.5: `sem_op == 0` "wait
    /// until value becomes zero").
    fn batch_would_block(set: &SemSet<T>, ops: &[SemOp]) -> Result<bool> {
        let mut scratch = set.values.clone();
        for op in ops {
            let v = scratch.get_mut(op.sem_num).ok_or_else(|| Error::new(Code::Inval))?;
            if op.sem_op == 0 {
                if *v != 0 {
                    return Ok(true);
                }
                continue;
            }
            let next = *v as i32 + op.sem_op;
            if next < 0 {
                return Ok(true);
            }
            *v = next as u16;
        }
        Ok(false)
    }

    fn apply(set: &mut SemSet<T>, ops: &[SemOp]) {
        for op in ops {
            if op.sem_op == 0 {
                continue;
            }
            let v = &mut set.values[op.sem_num];
            *v = (*v as i32 + op.sem_op) as u16;
        }
    }

    /// `sem_op(id, ops, token)`: applies the whole batch atomically
    /// (spec §4.5: "a batch that would block on any op suspends the
    /// caller with no state change"). If the batch would block, `token`
    /// is parked under `IPC_NOWAIT`... unless `IPC_NOWAIT` is set, in
    /// which case the caller gets `EAGAIN` immediately.
    ///
    /// Applying a batch may free up capacity for already-parked
    /// waiters; they're replayed in FIFO order and stop at the first one
    /// that still can't proceed, so a later waiter never jumps a still-
    /// blocked earlier one.
    pub fn sem_op(
        &mut self,
        id: usize,
        ops: Vec<SemOp>,
        token: T,
    ) -> Result<(Outcome<()>, Vec<Completion<T, ()>>)> {
        let set = self.set_mut(id)?;

        if Self::batch_would_block(set, &ops)? {
            let nowait = ops.iter().any(|op| op.sem_flg.contains(IpcFlags::NOWAIT));
            if nowait {
                return Err(Error::new(Code::Again));
            }
            set.wait_queue.push_back((token, ops));
            return Ok((Outcome::Parked, vec![]));
        }

        Self::apply(set, &ops);

        let mut completions = Vec::new();
        while let Some((_, front_ops)) = set.wait_queue.front() {
            if Self::batch_would_block(set, front_ops)? {
                break;
            }
            let (waiter_token, waiter_ops) = set.wait_queue.pop_front().expect("front() just matched");
            Self::apply(set, &waiter_ops);
            completions.push(Completion { token: waiter_token, result: () });
        }

        Ok((Outcome::Ready(()), completions))
    }

    pub fn sem_close(&mut self, id: usize) -> Result<()> {
        let slot = self.sets.get_mut(id).ok_or_else(|| Error::new(Code::Inval))?;
        if slot.is_none() {
            return Err(Error::new(Code::Inval));
        }
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready<R, C>(r: Result<(Outcome<R>, Vec<C>)>) -> R {
        match r.unwrap() {
            (Outcome::Ready(v), _) => v,
            (Outcome::Parked, _) => panic!("expected Ready, got Parked"),
        }
    }

    #[test]
    fn message_queue_fifo_round_trip() {
        let mut store: MsgQueueStore<u64> = MsgQueueStore::new();
        let id = store.msg_get(1, IpcFlags::CREAT).unwrap();
        ready(store.msg_send(
            id,
            Message { mtype: 1, data: b"first".to_vec() },
            IpcFlags::empty(),
            0,
        ));
        ready(store.msg_send(
            id,
            Message { mtype: 1, data: b"second".to_vec() },
            IpcFlags::empty(),
            0,
        ));
        let (m1, _) = ready(store.msg_receive(id, 0, IpcFlags::empty(), 0));
        let (m2, _) = ready(store.msg_receive(id, 0, IpcFlags::empty(), 0));
        assert_eq!(m1, b"first".to_vec());
        assert_eq!(m2, b"second".to_vec());
    }

    #[test]
    fn receive_on_empty_queue_is_nomsg_under_nowait() {
        let mut store: MsgQueueStore<u64> = MsgQueueStore::new();
        let id = store.msg_get(1, IpcFlags::CREAT).unwrap();
        assert_eq!(
            store.msg_receive(id, 0, IpcFlags::NOWAIT, 0).unwrap_err().code(),
            Code::NoMsg
        );
    }

    #[test]
    fn receive_on_empty_queue_without_nowait_parks() {
        let mut store: MsgQueueStore<u64> = MsgQueueStore::new();
        let id = store.msg_get(1, IpcFlags::CREAT).unwrap();
        let (outcome, completions) = store.msg_receive(id, 0, IpcFlags::empty(), 42).unwrap();
        assert!(matches!(outcome, Outcome::Parked));
        assert!(completions.is_empty());
    }

    #[test]
    fn blocked_receiver_is_woken_by_a_later_send() {
        let mut store: MsgQueueStore<u64> = MsgQueueStore::new();
        let id = store.msg_get(1, IpcFlags::CREAT).unwrap();
        let (outcome, _) = store.msg_receive(id, 0, IpcFlags::empty(), 7).unwrap();
        assert!(matches!(outcome, Outcome::Parked));

        let (send_outcome, completions) = store
            .msg_send(id, Message { mtype: 9, data: b"late".to_vec() }, IpcFlags::empty(), 0)
            .unwrap();
        assert!(matches!(send_outcome, Outcome::Ready(())));
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].token, 7);
        assert_eq!(completions[0].result, (9, b"late".to_vec()));
        // handed straight to the waiting receiver, never touched the ring.
        assert_eq!(store.queues[id].as_ref().unwrap().messages.len(), 0);
    }

    #[test]
    fn full_queue_rejects_send_under_nowait_with_enospc() {
        let mut store: MsgQueueStore<u64> = MsgQueueStore::new();
        let id = store.msg_get(1, IpcFlags::CREAT).unwrap();
        for _ in 0..NANVIX_MSG_LENGTH_MAX {
            ready(store.msg_send(id, Message { mtype: 1, data: vec![] }, IpcFlags::empty(), 0));
        }
        assert_eq!(
            store
                .msg_send(id, Message { mtype: 1, data: vec![] }, IpcFlags::NOWAIT, 0)
                .unwrap_err()
                .code(),
            Code::NoSpace
        );
    }

    #[test]
    fn full_queue_send_parks_and_is_woken_by_a_receive() {
        let mut store: MsgQueueStore<u64> = MsgQueueStore::new();
        let id = store.msg_get(1, IpcFlags::CREAT).unwrap();
        for _ in 0..NANVIX_MSG_LENGTH_MAX {
            ready(store.msg_send(id, Message { mtype: 1, data: vec![] }, IpcFlags::empty(), 0));
        }
        let (outcome, _) = store
            .msg_send(id, Message { mtype: 2, data: b"queued".to_vec() }, IpcFlags::empty(), 99)
            .unwrap();
        assert!(matches!(outcome, Outcome::Parked));

        for _ in 0..NANVIX_MSG_LENGTH_MAX - 1 {
            ready(store.msg_receive(id, 0, IpcFlags::empty(), 0));
        }
        // this receive drains the last original message and wakes the
        // parked sender, whose message becomes the next one delivered.
        let (_, completions) = store.msg_receive(id, 0, IpcFlags::empty(), 0).unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].token, 99);

        let (m, _) = ready(store.msg_receive(id, 0, IpcFlags::empty(), 0));
        assert_eq!(m, (2, b"queued".to_vec()));
    }

    #[test]
    fn get_with_excl_on_existing_key_is_eexist() {
        let mut store: MsgQueueStore<u64> = MsgQueueStore::new();
        store.msg_get(5, IpcFlags::CREAT).unwrap();
        assert_eq!(
            store.msg_get(5, IpcFlags::CREAT | IpcFlags::EXCL).unwrap_err().code(),
            Code::Exists
        );
    }

    #[test]
    fn oversize_message_is_einval() {
        let mut store: MsgQueueStore<u64> = MsgQueueStore::new();
        let id = store.msg_get(1, IpcFlags::CREAT).unwrap();
        let huge = vec![0u8; NANVIX_MSG_SIZE_MAX + 1];
        assert_eq!(
            store
                .msg_send(id, Message { mtype: 1, data: huge }, IpcFlags::empty(), 0)
                .unwrap_err()
                .code(),
            Code::Inval
        );
    }

    #[test]
    fn semaphore_mutual_exclusion() {
        let mut sems: SemaphoreStore<u64> = SemaphoreStore::new();
        let id = sems.sem_get(1, 1, IpcFlags::CREAT).unwrap();
        ready(sems.sem_op(
            id,
            vec![SemOp { sem_num: 0, sem_op: 1, sem_flg: IpcFlags::empty() }],
            0,
        ));
        assert_eq!(sems.get_value(id, 0).unwrap(), 1);

        ready(sems.sem_op(
            id,
            vec![SemOp { sem_num: 0, sem_op: -1, sem_flg: IpcFlags::empty() }],
            0,
        ));
        assert_eq!(sems.get_value(id, 0).unwrap(), 0);

        assert_eq!(
            sems.sem_op(
                id,
                vec![SemOp { sem_num: 0, sem_op: -1, sem_flg: IpcFlags::NOWAIT }],
                0,
            )
            .unwrap_err()
            .code(),
            Code::Again
        );
    }

    #[test]
    fn sem_op_zero_returns_immediately_when_already_zero() {
        let mut sems: SemaphoreStore<u64> = SemaphoreStore::new();
        let id = sems.sem_get(1, 1, IpcFlags::CREAT).unwrap();
        ready(sems.sem_op(
            id,
            vec![SemOp { sem_num: 0, sem_op: 0, sem_flg: IpcFlags::empty() }],
            0,
        ));
    }

    #[test]
    fn sem_op_zero_blocks_on_nonzero_value_and_wakes_on_decrement_to_zero() {
        let mut sems: SemaphoreStore<u64> = SemaphoreStore::new();
        let id = sems.sem_get(1, 1, IpcFlags::CREAT).unwrap();
        ready(sems.sem_op(
            id,
            vec![SemOp { sem_num: 0, sem_op: 1, sem_flg: IpcFlags::empty() }],
            0,
        ));

        assert_eq!(
            sems.sem_op(
                id,
                vec![SemOp { sem_num: 0, sem_op: 0, sem_flg: IpcFlags::NOWAIT }],
                0,
            )
            .unwrap_err()
            .code(),
            Code::Again
        );

        let (outcome, _) = sems
            .sem_op(id, vec![SemOp { sem_num: 0, sem_op: 0, sem_flg: IpcFlags::empty() }], 55)
            .unwrap();
        assert!(matches!(outcome, Outcome::Parked));

        let (_, completions) = sems
            .sem_op(id, vec![SemOp { sem_num: 0, sem_op: -1, sem_flg: IpcFlags::empty() }], 0)
            .unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].token, 55);
    }

    #[test]
    fn batch_that_would_block_leaves_state_unchanged() {
        let mut sems: SemaphoreStore<u64> = SemaphoreStore::new();
        let id = sems.sem_get(1, 2, IpcFlags::CREAT).unwrap();
        ready(sems.sem_op(
            id,
            vec![SemOp { sem_num: 0, sem_op: 1, sem_flg: IpcFlags::empty() }],
            0,
        ));

        let result = sems.sem_op(
            id,
            vec![
                SemOp { sem_num: 0, sem_op: -1, sem_flg: IpcFlags::NOWAIT },
                SemOp { sem_num: 1, sem_op: -1, sem_flg: IpcFlags::NOWAIT },
            ],
            0,
        );
        assert_eq!(result.unwrap_err().code(), Code::Again);
        assert_eq!(sems.get_value(id, 0).unwrap(), 1);
        assert_eq!(sems.get_value(id, 1).unwrap(), 0);
    }

    #[test]
    fn blocked_batch_parks_without_state_change_and_wakes_in_fifo_order() {
        let mut sems: SemaphoreStore<u64> = SemaphoreStore::new();
        let id = sems.sem_get(1, 1, IpcFlags::CREAT).unwrap();

        let (outcome_a, _) = sems
            .sem_op(id, vec![SemOp { sem_num: 0, sem_op: -1, sem_flg: IpcFlags::empty() }], 1)
            .unwrap();
        assert!(matches!(outcome_a, Outcome::Parked));
        let (outcome_b, _) = sems
            .sem_op(id, vec![SemOp { sem_num: 0, sem_op: -1, sem_flg: IpcFlags::empty() }], 2)
            .unwrap();
        assert!(matches!(outcome_b, Outcome::Parked));
        assert_eq!(sems.get_value(id, 0).unwrap(), 0);

        // one increment only satisfies the first parked waiter.
        let (_, completions) = sems
            .sem_op(id, vec![SemOp { sem_num: 0, sem_op: 1, sem_flg: IpcFlags::empty() }], 0)
            .unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].token, 1);
        assert_eq!(sems.get_value(id, 0).unwrap(), 0);

        let (_, completions2) = sems
            .sem_op(id, vec![SemOp { sem_num: 0, sem_op: 1, sem_flg: IpcFlags::empty() }], 0)
            .unwrap();
        assert_eq!(completions2.len(), 1);
        assert_eq!(completions2[0].token, 2);
    }

    #[test]
    fn sem_set_full_is_nospace() {
        let mut sems: SemaphoreStore<u64> = SemaphoreStore::new();
        for i in 0..NANVIX_SEM_MAX {
            sems.sem_get(i as i32, 1, IpcFlags::CREAT).unwrap();
        }
        assert_eq!(sems.sem_get(999, 1, IpcFlags::CREAT).unwrap_err().code(), Code::NoSpace);
    }
}
