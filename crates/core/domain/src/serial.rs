//! RS232 串口参数枚举。

string_enum! {
    /// 停止位。
    pub enum StopBits {
        One => "ONE",
        OnePointFive => "ONE_POINT_FIVE",
        Two => "TWO",
    }
}

string_enum! {
    /// 校验位。
    pub enum Parity {
        None => "NONE",
        Even => "EVEN",
        Odd => "ODD",
        Mark => "MARK",
        Space => "SPACE",
    }
}

string_enum! {
    /// 流控方式。
    pub enum FlowControl {
        None => "NONE",
        RtsCts => "RTS_CTS",
        XonXoff => "XON_XOFF",
    }
}
