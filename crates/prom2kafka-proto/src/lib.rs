// prom2kafka-proto - Prometheus remote-write protocol definitions
//
// Message types for `prometheus.WriteRequest` (remote-write 1.0).
// Declared with prost derives instead of a build script so the crate needs no
// protoc at build time. Only the fields the bridge consumes are declared;
// prost skips unknown fields on decode.

pub mod prometheus {
    /// Top-level remote-write payload.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct WriteRequest {
        #[prost(message, repeated, tag = "1")]
        pub timeseries: ::prost::alloc::vec::Vec<TimeSeries>,
        #[prost(message, repeated, tag = "3")]
        pub metadata: ::prost::alloc::vec::Vec<MetricMetadata>,
    }

    /// One labelled series with its samples.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TimeSeries {
        #[prost(message, repeated, tag = "1")]
        pub labels: ::prost::alloc::vec::Vec<Label>,
        #[prost(message, repeated, tag = "2")]
        pub samples: ::prost::alloc::vec::Vec<Sample>,
        #[prost(message, repeated, tag = "3")]
        pub exemplars: ::prost::alloc::vec::Vec<Exemplar>,
        #[prost(message, repeated, tag = "4")]
        pub histograms: ::prost::alloc::vec::Vec<Histogram>,
    }

    #[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
    pub struct Label {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub value: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Sample {
        #[prost(double, tag = "1")]
        pub value: f64,
        /// Milliseconds since the Unix epoch.
        #[prost(int64, tag = "2")]
        pub timestamp: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Exemplar {
        #[prost(message, repeated, tag = "1")]
        pub labels: ::prost::alloc::vec::Vec<Label>,
        #[prost(double, tag = "2")]
        pub value: f64,
        #[prost(int64, tag = "3")]
        pub timestamp: i64,
    }

    /// Native histogram sample. Bucket layout fields are not declared: the
    /// bridge counts native histograms but does not expand them.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Histogram {
        #[prost(double, tag = "3")]
        pub sum: f64,
        #[prost(sint32, tag = "4")]
        pub schema: i32,
        #[prost(int64, tag = "15")]
        pub timestamp: i64,
    }

    /// Metric family metadata sent alongside the series.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct MetricMetadata {
        #[prost(enumeration = "metric_metadata::MetricType", tag = "1")]
        pub r#type: i32,
        #[prost(string, tag = "2")]
        pub metric_family_name: ::prost::alloc::string::String,
        #[prost(string, tag = "4")]
        pub help: ::prost::alloc::string::String,
        #[prost(string, tag = "5")]
        pub unit: ::prost::alloc::string::String,
    }

    pub mod metric_metadata {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
        #[repr(i32)]
        pub enum MetricType {
            Unknown = 0,
            Counter = 1,
            Gauge = 2,
            Histogram = 3,
            Gaugehistogram = 4,
            Summary = 5,
            Info = 6,
            Stateset = 7,
        }

        impl MetricType {
            /// Lowercase name as used by the Prometheus exposition format.
            pub fn as_str(&self) -> &'static str {
                match self {
                    MetricType::Unknown => "unknown",
                    MetricType::Counter => "counter",
                    MetricType::Gauge => "gauge",
                    MetricType::Histogram => "histogram",
                    MetricType::Gaugehistogram => "gaugehistogram",
                    MetricType::Summary => "summary",
                    MetricType::Info => "info",
                    MetricType::Stateset => "stateset",
                }
            }
        }
    }
}

pub use prometheus::{
    Exemplar, Histogram, Label, MetricMetadata, Sample, TimeSeries, WriteRequest,
};
