// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! No-argument test runner exercising the end-to-end scenarios every
//! component's unit tests cover individually: this binary drives them
//! together, through a fully booted [`nvx_runtime::System`], the way
//! `src/apps/rustunittests` in the teacher drives its suite. Exit code is
//! `0` on all-pass, non-zero on any failure.

use nvx_base::config::Topology;
use nvx_base::ids::{NodeId, PortId};
use nvx_base::limits::{PAGE_SIZE, RMEM_SIZE};
use nvx_base::Pid;
use nvx_rcache::PolicyKind;
use nvx_runtime::System;
use nvx_sysv_server::IpcFlags;
use nvx_vfs_core::{OpenFlags, Whence};

type ScenarioResult = Result<(), String>;

fn name_round_trip(sys: &System) -> ScenarioResult {
    let name = sys.name_client(Pid(100)).map_err(|e| e.to_string())?;
    name.link("proc0", NodeId(1), PortId(10)).map_err(|e| e.to_string())?;
    let resolved = name.lookup("proc0").map_err(|e| e.to_string())?;
    if resolved != (NodeId(1), PortId(10)) {
        return Err(format!("lookup returned {resolved:?}, expected (1, 10)"));
    }
    name.unlink("proc0").map_err(|e| e.to_string())?;
    match name.lookup("proc0") {
        Err(e) if e.code() == nvx_base::Code::NoEnt => Ok(()),
        Err(e) => Err(format!("unlink then lookup failed with {e}, expected ENOENT")),
        Ok(_) => Err("lookup succeeded after unlink".into()),
    }
}

fn queue_fifo(sys: &System) -> ScenarioResult {
    let sysv = sys.sysv_client(Pid(101)).map_err(|e| e.to_string())?;
    let id = sysv.msg_get(200, IpcFlags::CREAT).map_err(|e| e.to_string())?;
    sysv.msg_send(id, 1, vec![0x01u8; 512], IpcFlags::empty())
        .map_err(|e| e.to_string())?;
    sysv.msg_send(id, 1, vec![0x02u8; 512], IpcFlags::empty())
        .map_err(|e| e.to_string())?;
    let (_, first) = sysv.msg_receive(id, 0, IpcFlags::empty()).map_err(|e| e.to_string())?;
    let (_, second) = sysv.msg_receive(id, 0, IpcFlags::empty()).map_err(|e| e.to_string())?;
    if first != vec![0x01u8; 512] || second != vec![0x02u8; 512] {
        return Err("queue did not preserve FIFO order".into());
    }
    Ok(())
}

fn semaphore_mutual_exclusion(sys: &System) -> ScenarioResult {
    use nvx_sysv_server::SemOp;

    let sysv = sys.sysv_client(Pid(102)).map_err(|e| e.to_string())?;
    let id = sysv
        .sem_get(300, 1, IpcFlags::CREAT | IpcFlags::EXCL)
        .map_err(|e| e.to_string())?;
    sysv.sem_op(id, vec![SemOp { sem_num: 0, sem_op: 1, sem_flg: IpcFlags::empty() }])
        .map_err(|e| e.to_string())?;
    sysv.sem_op(id, vec![SemOp { sem_num: 0, sem_op: -1, sem_flg: IpcFlags::empty() }])
        .map_err(|e| e.to_string())?;
    sysv.sem_op(id, vec![SemOp { sem_num: 0, sem_op: 0, sem_flg: IpcFlags::empty() }])
        .map_err(|e| e.to_string())?;
    match sysv.sem_op(id, vec![SemOp { sem_num: 0, sem_op: -1, sem_flg: IpcFlags::NOWAIT }]) {
        Err(e) if e.code() == nvx_base::Code::Again => Ok(()),
        Err(e) => Err(format!("blocking semop with IPC_NOWAIT failed with {e}, expected EAGAIN")),
        Ok(_) => Err("semop(-1) succeeded on an exhausted semaphore".into()),
    }
}

fn page_cache_read_own_writes(sys: &System) -> ScenarioResult {
    for policy in [PolicyKind::Fifo, PolicyKind::Lru, PolicyKind::Nfu, PolicyKind::Aging, PolicyKind::Bypass] {
        let mut cache = sys.page_cache(Pid(103)).map_err(|e| e.to_string())?;
        cache.select_replacement_policy(policy);

        let n = cache.alloc().map_err(|e| e.to_string())?;
        {
            let p = cache.get(n).map_err(|e| e.to_string())?;
            p[0] = 0xA5;
            p[PAGE_SIZE - 1] = 0xA5;
        }
        cache.put(n, 0).map_err(|e| e.to_string())?;

        let p2 = cache.get(n).map_err(|e| e.to_string())?;
        if p2[0] != 0xA5 || p2[PAGE_SIZE - 1] != 0xA5 {
            return Err(format!("{policy:?}: read-own-writes did not hold"));
        }
    }
    Ok(())
}

fn vfs_read_write(sys: &System) -> ScenarioResult {
    const BLOCK: i64 = 512;

    let vfs = sys.vfs_client(Pid(104)).map_err(|e| e.to_string())?;
    let fd = vfs
        .open("/disk", OpenFlags::CREATE | OpenFlags::READ | OpenFlags::WRITE)
        .map_err(|e| e.to_string())?;

    vfs.seek(fd, 8 * BLOCK, Whence::Set).map_err(|e| e.to_string())?;
    let written = vfs.write(fd, &[1u8; 512]).map_err(|e| e.to_string())?;
    if written != 512 {
        return Err(format!("write returned {written}, expected 512"));
    }

    vfs.seek(fd, 8 * BLOCK, Whence::Set).map_err(|e| e.to_string())?;
    let mut buf = [0u8; 512];
    let read = vfs.read(fd, &mut buf).map_err(|e| e.to_string())?;
    if read != 512 {
        return Err(format!("read returned {read}, expected 512"));
    }
    if buf.iter().any(|&b| b != 1) {
        return Err("read-back buffer did not match what was written".into());
    }

    vfs.close(fd).map_err(|e| e.to_string())?;
    Ok(())
}

/// The low-level RMem server (component G), exercised directly rather
/// than through the wire client: `RmemClient`'s `alloc`/`read`/`write`
/// operate in whole-page units, while this scenario probes byte-address
/// validation at the server's boundary (spec §4.6).
fn invalid_rmem_write() -> ScenarioResult {
    let mut srv = nvx_rmem_server::RmemServer::new();
    let data_size = 64usize;
    let buf = vec![0u8; data_size];

    if srv.write(RMEM_SIZE, &buf).is_ok() {
        return Err("write at addr == RMEM_SIZE should fail".into());
    }
    if srv.write(RMEM_SIZE - data_size / 2, &buf).is_ok() {
        return Err("write crossing RMEM_SIZE should fail".into());
    }
    // a degenerate zero-length write at the same out-of-range address
    // must still fail: address validation, not a length check, rejects it.
    if srv.write(RMEM_SIZE, &[]).is_ok() {
        return Err("zero-length write at addr == RMEM_SIZE should fail".into());
    }
    Ok(())
}

fn run(name: &str, f: impl FnOnce() -> ScenarioResult) -> bool {
    match f() {
        Ok(()) => {
            log::info!("PASS {name}");
            true
        },
        Err(msg) => {
            log::error!("FAIL {name}: {msg}");
            false
        },
    }
}

fn main() {
    nvx_base::logging::init("testrunner");

    let sys = match System::boot(Topology::unix64()) {
        Ok(sys) => sys,
        Err(e) => {
            log::error!("failed to boot system: {e}");
            std::process::exit(1);
        },
    };

    let mut all_passed = true;
    all_passed &= run("name_round_trip", || name_round_trip(&sys));
    all_passed &= run("queue_fifo", || queue_fifo(&sys));
    all_passed &= run("semaphore_mutual_exclusion", || semaphore_mutual_exclusion(&sys));
    all_passed &= run("page_cache_read_own_writes", || page_cache_read_own_writes(&sys));
    all_passed &= run("vfs_read_write", || vfs_read_write(&sys));
    all_passed &= run("invalid_rmem_write", invalid_rmem_write);

    if let Err(e) = sys.shutdown() {
        log::error!("shutdown failed: {e}");
        all_passed = false;
    }

    if all_passed {
        log::info!("all scenarios passed");
        std::process::exit(0);
    }
    else {
        std::process::exit(1);
    }
}
