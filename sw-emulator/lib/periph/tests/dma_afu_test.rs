// Licensed under the Apache-2.0 license

use dma_emu_bus::testing::Log;
use dma_emu_bus::Bus;
use dma_emu_periph::csr::{Control, CsrIndex, FillLevelWord, SeqNumWord};
use dma_emu_periph::{AxiMemoryArgs, DmaAfu, DmaAfuArgs, DmaMode, DmaStatus};
use dma_emu_types::{AxiBurst, CsrSize};

const MEM_SIZE: usize = 0x40000;

fn args() -> DmaAfuArgs {
    let mem = AxiMemoryArgs {
        size: MEM_SIZE,
        ..Default::default()
    };
    DmaAfuArgs {
        host: mem.clone(),
        bank: mem,
        ..Default::default()
    }
}

fn write_csr(afu: &mut DmaAfu, index: CsrIndex, val: u64) {
    afu.write(CsrSize::DoubleWord, index.offset(), val).unwrap();
}

fn read_csr(afu: &mut DmaAfu, index: CsrIndex) -> u64 {
    afu.read(CsrSize::DoubleWord, index.offset()).unwrap()
}

fn status(afu: &mut DmaAfu) -> DmaStatus {
    DmaStatus::from_bits(read_csr(afu, CsrIndex::Status))
}

fn submit(afu: &mut DmaAfu, src: u64, dest: u64, lines: u64, mode: DmaMode) {
    write_csr(afu, CsrIndex::SrcAddr, src);
    write_csr(afu, CsrIndex::DestAddr, dest);
    write_csr(afu, CsrIndex::Length, lines);
    write_csr(afu, CsrIndex::DescriptorControl, mode.control_word());
}

fn reset_dispatcher(afu: &mut DmaAfu) {
    write_csr(afu, CsrIndex::Control, Control::RESET_DISPATCHER::SET.value);
}

/// Step until BUSY drops. Returns the number of cycles taken.
fn run_until_idle(afu: &mut DmaAfu, limit: u64) -> u64 {
    for cycle in 1..=limit {
        afu.poll();
        if !status(afu).busy {
            return cycle;
        }
    }
    panic!("engine still busy after {limit} cycles");
}

/// Little-endian u64 index pattern.
fn index_pattern(bytes: &mut [u8], first: u64) {
    for (i, chunk) in bytes.chunks_exact_mut(8).enumerate() {
        chunk.copy_from_slice(&(first + i as u64).to_le_bytes());
    }
}

/// Value of `key=0x..` in a channel trace line.
fn hex_field(line: &str, key: &str) -> u64 {
    let value = line
        .split_whitespace()
        .find_map(|tok| tok.strip_prefix(key))
        .unwrap();
    u64::from_str_radix(value.trim_start_matches("0x"), 16).unwrap()
}

fn lines_with_prefix(log: &Log, prefix: &str) -> Vec<String> {
    log.lines()
        .into_iter()
        .filter(|l| l.starts_with(prefix))
        .collect()
}

#[test]
fn test_host_to_ddr_end_to_end() {
    let mut afu = DmaAfu::new(args()).unwrap();
    index_pattern(&mut afu.host_memory_mut().ram_mut().data_mut()[0x1000..0x1100], 100);
    let host_trace = Log::new();
    let bank_trace = Log::new();
    afu.host_memory_mut().set_trace(host_trace.clone());
    afu.bank_memory_mut(0).unwrap().set_trace(bank_trace.clone());

    assert!(!status(&mut afu).busy);
    submit(&mut afu, 0x1000, 0x2000, 4, DmaMode::HostToDdr);
    assert!(status(&mut afu).busy);
    run_until_idle(&mut afu, 500);

    let st = status(&mut afu);
    assert!(!st.busy && !st.stopped_on_error && !st.rd_error && !st.wr_error);
    assert!(st.descriptor_buffer_empty && st.response_buffer_empty);

    assert_eq!(
        lines_with_prefix(&host_trace, "AR "),
        vec!["AR addr=0x1000 len=3 size=Bytes64 burst=Incr"]
    );
    assert_eq!(
        lines_with_prefix(&bank_trace, "AW "),
        vec!["AW addr=0x2000 len=3 size=Bytes64 burst=Incr"]
    );
    let reads: Vec<u64> = lines_with_prefix(&host_trace, "R ")
        .iter()
        .map(|l| hex_field(l, "data="))
        .collect();
    let writes = lines_with_prefix(&bank_trace, "W ");
    let written: Vec<u64> = writes.iter().map(|l| hex_field(l, "data=")).collect();
    let lasts: Vec<u64> = writes.iter().map(|l| hex_field(l, "last=")).collect();
    assert_eq!(reads, vec![100, 108, 116, 124]);
    assert_eq!(written, reads);
    assert_eq!(lasts, vec![0, 0, 0, 1]);
    assert_eq!(lines_with_prefix(&bank_trace, "B "), vec!["B resp=OKAY"]);

    let bank = afu.bank_memory(0).unwrap().ram().data();
    let host = afu.host_memory().ram().data();
    assert_eq!(&bank[0x2000..0x2100], &host[0x1000..0x1100]);
    assert_eq!(afu.protocol_violations(), 0);
}

#[test]
fn test_write_response_error_is_sticky() {
    let mut afu = DmaAfu::new(args()).unwrap();
    afu.bank_memory_mut(0)
        .unwrap()
        .inject_write_error(0x2000..0x2100);
    submit(&mut afu, 0x1000, 0x2000, 4, DmaMode::HostToDdr);
    afu.run(100);
    let st = status(&mut afu);
    assert!(st.stopped_on_error && st.wr_error && !st.rd_error);

    for _ in 0..100 {
        submit(&mut afu, 0x1000, 0x4000, 1, DmaMode::HostToDdr);
        afu.poll();
        assert!(status(&mut afu).stopped_on_error);
    }
    assert_eq!(
        FillLevelWord(read_csr(&mut afu, CsrIndex::WrReFillLevel)).descriptors(),
        0
    );
    assert_eq!(
        SeqNumWord(read_csr(&mut afu, CsrIndex::WrReSeqNum)).wr_seq(),
        0
    );

    reset_dispatcher(&mut afu);
    afu.poll();
    let st = status(&mut afu);
    assert!(!st.stopped_on_error && !st.busy && !st.resetting);

    submit(&mut afu, 0x1000, 0x4000, 1, DmaMode::HostToDdr);
    run_until_idle(&mut afu, 200);
    assert!(!status(&mut afu).stopped_on_error);
    assert_eq!(
        SeqNumWord(read_csr(&mut afu, CsrIndex::WrReSeqNum)).wr_seq(),
        1
    );
}

#[test]
fn test_read_error_never_reaches_destination() {
    let mut afu = DmaAfu::new(args()).unwrap();
    index_pattern(&mut afu.host_memory_mut().ram_mut().data_mut()[..0x400], 1);
    afu.host_memory_mut().inject_read_error(0x80..0xc0);
    let bank_trace = Log::new();
    afu.bank_memory_mut(0).unwrap().set_trace(bank_trace.clone());

    submit(&mut afu, 0, 0, 8, DmaMode::HostToDdr);
    afu.run(300);
    let st = status(&mut afu);
    assert!(st.stopped_on_error && st.rd_error && !st.wr_error);

    // Lines before the failing one were forwarded, nothing after it was.
    let bank = afu.bank_memory(0).unwrap().ram().data();
    let host = afu.host_memory().ram().data();
    assert_eq!(&bank[..0x80], &host[..0x80]);
    assert!(bank[0x80..0x200].iter().all(|&b| b == 0));
    assert_eq!(lines_with_prefix(&bank_trace, "W ").len(), 2);
}

#[test]
fn test_source_at_top_of_address_space() {
    let mut afu = DmaAfu::new(args()).unwrap();
    submit(&mut afu, 0xFFFF_FFFF_FFFF_FFC0, 0, 1, DmaMode::HostToDdr);
    afu.run(100);
    let st = status(&mut afu);
    assert!(st.stopped_on_error && st.rd_error && !st.descriptor_invalid);
    assert_eq!(afu.protocol_violations(), 0);

    // A range that would run past the top is refused at admission.
    reset_dispatcher(&mut afu);
    afu.poll();
    submit(&mut afu, 0xFFFF_FFFF_FFFF_FFC0, 0, 2, DmaMode::HostToDdr);
    let st = status(&mut afu);
    assert!(st.descriptor_invalid && !st.busy);
    assert!(afu.bank_memory(0).unwrap().ram().data()[..0x80]
        .iter()
        .all(|&b| b == 0));
}

#[test]
fn test_burst_splitting() {
    let mut afu = DmaAfu::new(args()).unwrap();
    index_pattern(&mut afu.host_memory_mut().ram_mut().data_mut()[..200 * 64], 0);
    let bank_trace = Log::new();
    afu.bank_memory_mut(0).unwrap().set_trace(bank_trace.clone());

    submit(&mut afu, 0, 0, 200, DmaMode::HostToDdr);
    run_until_idle(&mut afu, 2000);

    let aw: Vec<u64> = lines_with_prefix(&bank_trace, "AW ")
        .iter()
        .map(|l| hex_field(l, "addr="))
        .collect();
    assert_eq!(aw, vec![0x0, 0x1000, 0x2000, 0x3000]);
    let lens: Vec<String> = lines_with_prefix(&bank_trace, "AW ")
        .iter()
        .map(|l| l.split_whitespace().nth(2).unwrap().to_string())
        .collect();
    assert_eq!(lens, vec!["len=63", "len=63", "len=63", "len=7"]);
    assert_eq!(bank_trace.count_prefix("W "), 200);
    let lasts = lines_with_prefix(&bank_trace, "W ")
        .iter()
        .filter(|l| l.ends_with("last=1"))
        .count();
    assert_eq!(lasts, 4);
    assert_eq!(bank_trace.count_prefix("B resp=OKAY"), 4);

    let bank = afu.bank_memory(0).unwrap().ram().data();
    let host = afu.host_memory().ram().data();
    assert_eq!(&bank[..200 * 64], &host[..200 * 64]);
    assert_eq!(afu.protocol_violations(), 0);
}

#[test]
fn test_back_to_back_descriptors() {
    let mut afu = DmaAfu::new(args()).unwrap();
    index_pattern(&mut afu.host_memory_mut().ram_mut().data_mut()[..0x1000], 7);
    submit(&mut afu, 0, 0x8000, 64, DmaMode::HostToDdr);
    submit(&mut afu, 0x8000, 0x10000, 64, DmaMode::DdrToHost);
    assert_eq!(
        FillLevelWord(read_csr(&mut afu, CsrIndex::WrReFillLevel)).descriptors(),
        2
    );
    run_until_idle(&mut afu, 2000);

    let seq = SeqNumWord(read_csr(&mut afu, CsrIndex::WrReSeqNum));
    assert_eq!((seq.rd_seq(), seq.wr_seq()), (2, 2));
    let host = afu.host_memory().ram().data();
    assert_eq!(&host[0x10000..0x11000], &host[..0x1000]);
}

#[test]
fn test_ddr_to_ddr_across_banks() {
    let mut afu = DmaAfu::new(args()).unwrap();
    index_pattern(
        &mut afu.bank_memory_mut(0).unwrap().ram_mut().data_mut()[0x100..0x900],
        0x55,
    );
    // Same bank, then bank 0 to bank 1.
    submit(&mut afu, 0x100, 0x3000, 32, DmaMode::DdrToDdr);
    submit(
        &mut afu,
        0x100,
        MEM_SIZE as u64 + 0x40,
        32,
        DmaMode::DdrToDdr,
    );
    run_until_idle(&mut afu, 2000);
    assert!(!status(&mut afu).stopped_on_error);

    let bank0 = afu.bank_memory(0).unwrap().ram().data();
    let bank1 = afu.bank_memory(1).unwrap().ram().data();
    assert_eq!(&bank0[0x3000..0x3800], &bank0[0x100..0x900]);
    assert_eq!(&bank1[0x40..0x840], &bank0[0x100..0x900]);
}

#[test]
fn test_invalid_descriptor() {
    let mut afu = DmaAfu::new(args()).unwrap();
    write_csr(&mut afu, CsrIndex::Control, Control::STOP_DESCRIPTORS::SET.value);
    submit(&mut afu, 0, 0x40, 1, DmaMode::HostToDdr);

    submit(&mut afu, 0x20, 0x40, 1, DmaMode::HostToDdr);
    submit(&mut afu, 0, 0x40, 0, DmaMode::HostToDdr);
    submit(&mut afu, 0, MEM_SIZE as u64 - 0x40, 2, DmaMode::HostToDdr);
    let st = status(&mut afu);
    assert!(st.descriptor_invalid && !st.stopped_on_error);
    assert_eq!(
        FillLevelWord(read_csr(&mut afu, CsrIndex::WrReFillLevel)).descriptors(),
        1
    );

    afu.run(10);
    assert!(status(&mut afu).descriptor_invalid);
    write_csr(
        &mut afu,
        CsrIndex::Control,
        (Control::RESET_DISPATCHER::SET + Control::STOP_DESCRIPTORS::SET).value,
    );
    afu.poll();
    let st = status(&mut afu);
    assert!(!st.descriptor_invalid && st.stopped);
    assert_eq!(
        FillLevelWord(read_csr(&mut afu, CsrIndex::WrReFillLevel)).descriptors(),
        1
    );

    write_csr(&mut afu, CsrIndex::Control, 0);
    run_until_idle(&mut afu, 200);
}

#[test]
fn test_queue_full_keeps_order() {
    let mut afu = DmaAfu::new(DmaAfuArgs {
        queue_depth: 2,
        ..args()
    })
    .unwrap();
    index_pattern(&mut afu.host_memory_mut().ram_mut().data_mut()[..0x100], 0);
    write_csr(&mut afu, CsrIndex::Control, Control::STOP_DESCRIPTORS::SET.value);
    submit(&mut afu, 0, 0x1000, 1, DmaMode::HostToDdr);
    submit(&mut afu, 0x40, 0x1040, 1, DmaMode::HostToDdr);
    assert!(status(&mut afu).descriptor_buffer_full);
    submit(&mut afu, 0x80, 0x1080, 1, DmaMode::HostToDdr);

    write_csr(&mut afu, CsrIndex::Control, 0);
    run_until_idle(&mut afu, 200);
    let bank = afu.bank_memory(0).unwrap().ram().data();
    let host = afu.host_memory().ram().data();
    assert_eq!(&bank[0x1000..0x1080], &host[..0x80]);
    assert!(bank[0x1080..0x10c0].iter().all(|&b| b == 0));
}

#[test]
fn test_random_backpressure() {
    let mut afu = DmaAfu::new(DmaAfuArgs {
        fifo_depth: 8,
        host: AxiMemoryArgs {
            size: MEM_SIZE,
            stall_percent: 40,
            seed: 1,
            ..Default::default()
        },
        bank: AxiMemoryArgs {
            size: MEM_SIZE,
            stall_percent: 25,
            seed: 2,
            read_latency: 9,
            write_latency: 5,
        },
        ..Default::default()
    })
    .unwrap();
    index_pattern(&mut afu.host_memory_mut().ram_mut().data_mut()[..300 * 64], 3);

    submit(&mut afu, 0, 0x1000, 300, DmaMode::HostToDdr);
    submit(&mut afu, 0x1000, 0x20000, 300, DmaMode::DdrToHost);
    run_until_idle(&mut afu, 50_000);

    assert!(!status(&mut afu).stopped_on_error);
    assert_eq!(afu.protocol_violations(), 0);
    let host = afu.host_memory().ram().data();
    assert_eq!(&host[0x20000..0x20000 + 300 * 64], &host[..300 * 64]);
}

#[test]
fn test_wrap_bursts() {
    let mut afu = DmaAfu::new(DmaAfuArgs {
        burst: AxiBurst::Wrap,
        ..args()
    })
    .unwrap();
    index_pattern(&mut afu.host_memory_mut().ram_mut().data_mut()[..0x2000], 11);
    let bank_trace = Log::new();
    afu.bank_memory_mut(0).unwrap().set_trace(bank_trace.clone());

    submit(&mut afu, 0x40, 0x440, 40, DmaMode::HostToDdr);
    run_until_idle(&mut afu, 2000);

    assert!(!status(&mut afu).stopped_on_error);
    assert_eq!(afu.protocol_violations(), 0);
    let bank = afu.bank_memory(0).unwrap().ram().data();
    let host = afu.host_memory().ram().data();
    assert_eq!(&bank[0x440..0x440 + 40 * 64], &host[0x40..0x40 + 40 * 64]);
    assert!(bank_trace
        .lines()
        .iter()
        .any(|l| l.starts_with("AW ") && l.ends_with("burst=Wrap")));
}

#[test]
fn test_perf_counters() {
    let mut afu = DmaAfu::new(args()).unwrap();
    submit(&mut afu, 0, 0, 256, DmaMode::HostToDdr);
    run_until_idle(&mut afu, 2000);

    let rd = dma_emu_periph::PerfCntrWord(read_csr(&mut afu, CsrIndex::RdSrcPerfCntr));
    let wr = dma_emu_periph::PerfCntrWord(read_csr(&mut afu, CsrIndex::WrDestPerfCntr));
    assert_eq!(rd.valid_count(), 256);
    assert_eq!(wr.valid_count(), 256);
    assert!(rd.clk_count() >= 256 && rd.uptime() > 0.8);
    assert!(wr.clk_count() >= 256 && wr.uptime() > 0.8);
}
