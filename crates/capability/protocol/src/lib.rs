//! # 报文解析能力模块
//!
//! 将各传输方式读出的报文行解释为结构化的结果字段，支持：
//! - **ASTM LIS2-A2**：H/P/O/R/Q/L 记录，`|` 字段、`^` 组件
//! - **HL7 v2.x**：MSH/PID/OBR/OBX 段，ORU^R01 结果与 ACK 应答
//! - **分隔文件**：CSV 导入后重排的 TAB 内部行
//! - **质控 Q 段**：`Q|seq|test^lot^level|value|unit|timestamp`
//!
//! ## 架构设计
//!
//! ```text
//! Transport Reader (lis-ingest) → Vec<String> 报文行
//!       │
//!       ▼
//! MessageLayout { Astm | Hl7 | Delimited }
//!       │
//!       ├── result_fields()   结果代码/值/单位/样本号
//!       ├── rewrite_result()  映射后重写同一布局
//!       └── order_context()   样本类型、医嘱项目约束
//!       │
//!       ▼
//! 映射引擎 (lis-normalize) / 插入器 (lis-plugin)
//! ```
//!
//! 本模块不做任何 IO，串口参数只在此处校验，打开由 lis-ingest 负责。

pub mod astm;
pub mod delimited;
pub mod encoding;
pub mod error;
pub mod hl7;
pub mod layout;
pub mod qc;
pub mod serial;
pub mod timestamp;

pub use encoding::{DecodedText, decode_bytes};
pub use error::ProtocolError;
pub use layout::{MessageLayout, OrderContext, ResultField, ResultUpdate};
pub use qc::{QcSegment, parse_qc_segment};
pub use serial::SerialSettings;
pub use timestamp::{parse_compact, parse_result_datetime};
