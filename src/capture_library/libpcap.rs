//! libpcap backed capture library.

use super::capture_trait::{CaptureLibrary, PacketReader, PacketWriter};
use super::types::{CaptureFormat, OutputTarget, PacketRecord};
use crate::error_handling::types::CaptureError;
use crate::time_resolver::types::Timeval;

use log::{debug, warn};
use pcap::{Capture, Offline, Packet, PacketHeader, Savefile};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Copy)]
pub struct Libpcap;

pub struct PcapReader {
    capture: Capture<Offline>,
    path: PathBuf,
}

pub struct PcapWriter {
    savefile: Savefile,
    target: OutputTarget,
}

impl CaptureLibrary for Libpcap {
    type Reader = PcapReader;
    type Writer = PcapWriter;

    fn open(&self, path: &Path) -> Result<PcapReader, CaptureError> {
        let capture = Capture::from_file(path).map_err(|e| CaptureError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!("Opened {}", path.display());
        Ok(PcapReader {
            capture,
            path: path.to_path_buf(),
        })
    }

    fn create_output(
        &self,
        reader: &PcapReader,
        target: &OutputTarget,
    ) -> Result<PcapWriter, CaptureError> {
        // libpcap treats "-" as standard output
        let savefile = match target {
            OutputTarget::File(path) => reader.capture.savefile(path),
            OutputTarget::Stream => reader.capture.savefile("-"),
        }
        .map_err(|e| CaptureError::OutputFailed(format!("{}: {}", target, e)))?;

        debug!(
            "Created output {} with link type {}",
            target,
            reader.format().linktype
        );
        Ok(PcapWriter {
            savefile,
            target: target.clone(),
        })
    }
}

impl PacketReader for PcapReader {
    fn install_filter(&mut self, expression: &str) -> Result<(), CaptureError> {
        self.capture
            .compile(expression, true)
            .map_err(|e| CaptureError::FilterCompilation {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;
        self.capture
            .filter(expression, true)
            .map_err(|e| CaptureError::FilterInstall {
                expression: expression.to_string(),
                reason: e.to_string(),
            })
    }

    fn next_packet(&mut self) -> Result<Option<PacketRecord>, CaptureError> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(Some(PacketRecord {
                timestamp: Timeval::new(
                    i64::from(packet.header.ts.tv_sec),
                    i64::from(packet.header.ts.tv_usec),
                ),
                captured_length: packet.header.caplen,
                original_length: packet.header.len,
                payload: packet.data.to_vec(),
            })),
            Err(pcap::Error::NoMorePackets) => Ok(None),
            Err(pcap::Error::PcapError(ref reason)) if reason.contains("truncated") => {
                warn!("{}: {}", self.path.display(), reason);
                Ok(None)
            }
            Err(e) => Err(CaptureError::ReadFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn format(&self) -> CaptureFormat {
        CaptureFormat {
            linktype: self.capture.get_datalink().0,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl PacketWriter for PcapWriter {
    fn write(&mut self, packet: &PacketRecord) -> Result<(), CaptureError> {
        let header = PacketHeader {
            ts: libc::timeval {
                tv_sec: packet.timestamp.secs() as libc::time_t,
                tv_usec: packet.timestamp.usecs() as libc::suseconds_t,
            },
            caplen: packet.captured_length,
            len: packet.original_length,
        };
        self.savefile.write(&Packet::new(&header, &packet.payload));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CaptureError> {
        self.savefile
            .flush()
            .map_err(|e| CaptureError::WriteFailed(format!("{}: {}", self.target, e)))
    }

    fn close(mut self) -> Result<(), CaptureError> {
        self.flush()?;
        debug!("Closed output {}", self.target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcap::Linktype;
    use tempfile::TempDir;

    fn write_capture(path: &Path, times: &[(i64, i64)]) {
        let dead = Capture::dead(Linktype::ETHERNET).unwrap();
        let mut out = dead.savefile(path).unwrap();
        for (secs, usecs) in times {
            let payload = vec![0u8; 60];
            let header = PacketHeader {
                ts: libc::timeval {
                    tv_sec: *secs as libc::time_t,
                    tv_usec: *usecs as libc::suseconds_t,
                },
                caplen: payload.len() as u32,
                len: payload.len() as u32,
            };
            out.write(&Packet::new(&header, &payload));
        }
        out.flush().unwrap();
    }

    #[test]
    fn reads_back_written_packets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.pcap.1");
        write_capture(&path, &[(100, 5), (101, 999_999)]);

        let mut reader = Libpcap.open(&path).unwrap();
        assert_eq!(reader.format().linktype, Linktype::ETHERNET.0);
        let first = reader.next_packet().unwrap().unwrap();
        assert_eq!(first.timestamp, Timeval::new(100, 5));
        assert_eq!(first.captured_length, 60);
        let second = reader.next_packet().unwrap().unwrap();
        assert_eq!(second.timestamp, Timeval::new(101, 999_999));
        assert!(reader.next_packet().unwrap().is_none());
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = Libpcap.open(&dir.path().join("missing")).err().unwrap();
        assert!(matches!(err, CaptureError::OpenFailed { .. }));
    }

    #[test]
    fn bad_filter_is_a_compilation_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.pcap.1");
        write_capture(&path, &[(100, 0)]);

        let mut reader = Libpcap.open(&path).unwrap();
        let err = reader.install_filter("proto and and").err().unwrap();
        assert!(matches!(err, CaptureError::FilterCompilation { .. }));
        reader.install_filter("tcp").unwrap();
    }
}
