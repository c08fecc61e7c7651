/*++

Licensed under the Apache-2.0 license.

File Name:

    router.rs

Abstract:

    File contains the memory router. It connects the read-source and
    write-destination machines to the physical memory ports selected by
    the transfer mode of the active descriptor.

--*/

use crate::axi::{AxiReadChannels, AxiWriteChannels};
use crate::axi_mem::AxiMemory;
use crate::descriptor::{Descriptor, DmaMode, LocalLayout};
use dma_emu_types::AxiAddr;

/// Physical port index of host memory. Local bank `i` is port `i + 1`.
pub const HOST_PORT: usize = 0;

/// Port selection and port-relative addresses of one descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    pub src_port: usize,
    pub src_addr: AxiAddr,
    pub dest_port: usize,
    pub dest_addr: AxiAddr,
}

impl Default for Route {
    fn default() -> Self {
        Self {
            src_port: HOST_PORT,
            src_addr: 0,
            dest_port: HOST_PORT,
            dest_addr: 0,
        }
    }
}

pub struct Router {
    memories: Vec<AxiMemory>,
    read_ports: Vec<AxiReadChannels>,
    write_ports: Vec<AxiWriteChannels>,
    layout: LocalLayout,
    route: Route,
}

impl Router {
    /// `host` becomes port 0 and `banks` follow in order.
    pub fn new(host: AxiMemory, banks: Vec<AxiMemory>, bank_size: u64) -> Self {
        let layout = LocalLayout {
            banks: banks.len(),
            bank_size,
        };
        let mut memories = vec![host];
        memories.extend(banks);
        let ports = memories.len();
        Self {
            memories,
            read_ports: vec![AxiReadChannels::default(); ports],
            write_ports: vec![AxiWriteChannels::default(); ports],
            layout,
            route: Route::default(),
        }
    }

    pub fn layout(&self) -> &LocalLayout {
        &self.layout
    }

    pub fn route(&self) -> Route {
        self.route
    }

    fn local(&self, addr: AxiAddr) -> (usize, AxiAddr) {
        let (bank, offset) = self.layout.locate(addr);
        (bank + 1, offset)
    }

    /// Select the ports for a validated descriptor.
    pub fn select(&mut self, mode: DmaMode, desc: &Descriptor) -> Route {
        let (src_port, src_addr) = if mode.src_is_local() {
            self.local(desc.src_addr)
        } else {
            (HOST_PORT, desc.src_addr)
        };
        let (dest_port, dest_addr) = if mode.dest_is_local() {
            self.local(desc.dest_addr)
        } else {
            (HOST_PORT, desc.dest_addr)
        };
        self.route = Route {
            src_port,
            src_addr,
            dest_port,
            dest_addr,
        };
        log::debug!("router: {:?} via {:?}", mode, self.route);
        self.route
    }

    /// Put every port at bus-idle values. Ports that are not the routed
    /// destination keep BREADY high so stray responses cannot stall.
    pub fn park(&mut self) {
        for (index, (rd, wr)) in self
            .read_ports
            .iter_mut()
            .zip(self.write_ports.iter_mut())
            .enumerate()
        {
            rd.park();
            wr.park();
            wr.b.ready = index != self.route.dest_port;
        }
    }

    pub fn drive(&mut self) {
        for (mem, (rd, wr)) in self
            .memories
            .iter_mut()
            .zip(self.read_ports.iter_mut().zip(self.write_ports.iter_mut()))
        {
            mem.drive_read(rd);
            mem.drive_write(wr);
        }
    }

    pub fn commit(&mut self) {
        for (mem, (rd, wr)) in self
            .memories
            .iter_mut()
            .zip(self.read_ports.iter().zip(self.write_ports.iter()))
        {
            mem.commit_read(rd);
            mem.commit_write(wr);
        }
    }

    /// Channels the read-source and write-destination machines see.
    pub fn routed_ports(&mut self) -> (&mut AxiReadChannels, &mut AxiWriteChannels) {
        (
            &mut self.read_ports[self.route.src_port],
            &mut self.write_ports[self.route.dest_port],
        )
    }

    pub fn read_port(&self, port: usize) -> &AxiReadChannels {
        &self.read_ports[port]
    }

    pub fn write_port(&self, port: usize) -> &AxiWriteChannels {
        &self.write_ports[port]
    }

    /// Abandon open bursts on every port.
    pub fn reset_ports(&mut self) {
        for mem in self.memories.iter_mut() {
            mem.reset_port();
        }
        for rd in self.read_ports.iter_mut() {
            *rd = AxiReadChannels::default();
        }
        for wr in self.write_ports.iter_mut() {
            *wr = AxiWriteChannels::default();
        }
    }

    pub fn ports(&self) -> usize {
        self.memories.len()
    }

    pub fn host(&self) -> &AxiMemory {
        &self.memories[HOST_PORT]
    }

    pub fn host_mut(&mut self) -> &mut AxiMemory {
        &mut self.memories[HOST_PORT]
    }

    pub fn memory(&self, port: usize) -> Option<&AxiMemory> {
        self.memories.get(port)
    }

    pub fn memory_mut(&mut self, port: usize) -> Option<&mut AxiMemory> {
        self.memories.get_mut(port)
    }

    pub fn protocol_violations(&self) -> u64 {
        self.memories.iter().map(|m| m.protocol_violations()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axi::AxiAddrReq;
    use crate::axi_mem::AxiMemoryArgs;
    use dma_emu_bus::Clock;
    use dma_emu_types::{AxiBurst, AxiSize};

    const BANK: u64 = 0x10000;

    fn router(clock: &Clock) -> Router {
        let args = AxiMemoryArgs {
            size: BANK as usize,
            ..Default::default()
        };
        Router::new(
            AxiMemory::new("host", clock.timer(), args.clone()),
            vec![
                AxiMemory::new("bank0", clock.timer(), args.clone()),
                AxiMemory::new("bank1", clock.timer(), args),
            ],
            BANK,
        )
    }

    #[test]
    fn test_select() {
        let clock = Clock::new();
        let mut router = router(&clock);
        assert_eq!(router.ports(), 3);

        let desc = Descriptor::new(0x1000, BANK + 0x2000, 4, DmaMode::HostToDdr);
        let route = router.select(DmaMode::HostToDdr, &desc);
        assert_eq!(
            route,
            Route {
                src_port: HOST_PORT,
                src_addr: 0x1000,
                dest_port: 2,
                dest_addr: 0x2000,
            }
        );

        let desc = Descriptor::new(0x40, 0x80, 1, DmaMode::DdrToHost);
        let route = router.select(DmaMode::DdrToHost, &desc);
        assert_eq!((route.src_port, route.dest_port), (1, HOST_PORT));

        let desc = Descriptor::new(BANK + 0x40, 0x80, 1, DmaMode::DdrToDdr);
        let route = router.select(DmaMode::DdrToDdr, &desc);
        assert_eq!(
            (route.src_port, route.src_addr, route.dest_port, route.dest_addr),
            (2, 0x40, 1, 0x80)
        );
    }

    #[test]
    fn test_park_idles_every_port() {
        let clock = Clock::new();
        let mut router = router(&clock);
        let desc = Descriptor::new(0, 0, 1, DmaMode::HostToDdr);
        router.select(DmaMode::HostToDdr, &desc);
        {
            let (rd, wr) = router.routed_ports();
            rd.r.ready = true;
            wr.aw.payload = Some(AxiAddrReq {
                addr: 0,
                len: 0,
                size: AxiSize::Bytes64,
                burst: AxiBurst::Incr,
            });
        }
        router.park();
        for port in 0..router.ports() {
            assert!(!router.read_port(port).ar.valid());
            assert!(!router.read_port(port).r.ready);
            assert!(!router.write_port(port).aw.valid());
            assert!(!router.write_port(port).w.valid());
        }
        assert!(router.write_port(HOST_PORT).b.ready);
        assert!(!router.write_port(1).b.ready);
        assert!(router.write_port(2).b.ready);
    }

    #[test]
    fn test_same_bank_both_directions() {
        let clock = Clock::new();
        let mut router = router(&clock);
        let desc = Descriptor::new(0x100, 0x200, 1, DmaMode::DdrToDdr);
        router.select(DmaMode::DdrToDdr, &desc);
        router.park();
        router.drive();
        let (rd, wr) = router.routed_ports();
        assert!(rd.ar.ready);
        assert!(wr.aw.ready);
    }
}
