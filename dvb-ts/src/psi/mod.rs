//! PSI/SI section layer.
//!
//! Sections are reassembled from packets by [`SectionDecoder`] and split
//! back into packets by [`SectionEncoder`]. Multi-section tables are
//! collected with [`Table`]; PAT, PMT, SDT, NIT, TDT and TOT have typed
//! views on top of it.

pub mod decoder;
pub mod descriptor;
pub mod encoder;
pub mod nit;
pub mod pat;
pub mod pmt;
pub mod reader;
pub mod sdt;
pub mod section;
pub mod table;
pub mod tdt;

pub use decoder::SectionDecoder;
pub use descriptor::{Descriptor, DescriptorIter, DescriptorList, DescriptorListBuf};
pub use encoder::SectionEncoder;
pub use nit::{MuxEntry, MuxInfo, MuxInfoList, Nit};
pub use pat::{Pat, PatEntry};
pub use pmt::{EsInfo, EsInfoList, Pmt};
pub use reader::{SectionReader, SectionStreamReader};
pub use sdt::{RunningStatus, Sdt, ServiceEntry, ServiceInfo, ServiceInfoList};
pub use section::{
    Section, SectionRef, SectionView, SectionViewMut, ISO_SECTION_MAX_LEN, SECTION_MAX_LEN,
};
pub use table::{Table, TableConfig, TableDescriptors, TableTracker, Track};
pub use tdt::{decode_tdt, encode_tdt, encode_tot, Tot, TDT_LEN};
