//! Tonic service implementation for the caller-facing `Collector` RPC.
//!
//! Converts between the wire proto messages and `broker_core`'s plain
//! types, then delegates entirely to [`broker_core::Broker::collect`].
//! Client disconnects and RPC deadlines are both handled the same way: a
//! dropped request future, in either case, drops the
//! [`broker_core::CancelSignal`]'s `rx`-adjacent cleanup guard inside
//! `collect()`, so the in-memory state never leaks an orphaned item even
//! though this layer never observes the disconnect directly.

use broker_core::{
    Broker, CancelSignal, DataBlock, Input, OutputOption, OutputSchema, Request as CoreRequest,
    Visualization,
};
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::warn;

pub mod proto {
    tonic::include_proto!("collector.v1");
}

use proto::collector_server::{Collector, CollectorServer};
use proto::{
    data_block::Kind as ProtoDataKind, output_schema::Kind as ProtoOutputKind,
    visualization::Kind as ProtoVisualizationKind, CollectRequest, CollectResponse,
};

pub struct CollectorService {
    broker: Arc<Broker>,
    default_deadline: std::time::Duration,
}

impl CollectorService {
    pub fn new(broker: Arc<Broker>, default_deadline: std::time::Duration) -> CollectorServer<Self> {
        CollectorServer::new(Self {
            broker,
            default_deadline,
        })
    }
}

#[tonic::async_trait]
impl Collector for CollectorService {
    async fn collect(
        &self,
        request: Request<CollectRequest>,
    ) -> Result<Response<CollectResponse>, Status> {
        let core_request = into_core_request(request.into_inner())?;

        // tonic surfaces a peer-supplied `grpc-timeout` as the request
        // deadline internally and drops this future if it elapses or the
        // client disconnects; we still arm our own deadline so a client
        // that sets none doesn't wait forever.
        let (_handle, cancel) = CancelSignal::new(Some(self.default_deadline));

        let response = self
            .broker
            .collect(core_request, cancel)
            .await
            .map_err(broker_error_to_status)?;

        Ok(Response::new(CollectResponse {
            index: response.index,
        }))
    }
}

fn broker_error_to_status(err: broker_core::BrokerError) -> Status {
    use broker_core::ErrorKind;
    let message = err.to_string();
    match err.kind() {
        ErrorKind::InvalidArgument => Status::invalid_argument(message),
        ErrorKind::ResourceExhausted => Status::resource_exhausted(message),
        ErrorKind::Cancelled => Status::cancelled(message),
        ErrorKind::DeadlineExceeded => Status::deadline_exceeded(message),
        ErrorKind::NotFound => Status::not_found(message),
        ErrorKind::Internal => {
            warn!(error = %message, "internal broker error");
            Status::internal(message)
        }
    }
}

fn into_core_request(proto: CollectRequest) -> Result<CoreRequest, Status> {
    let inputs = proto
        .inputs
        .into_iter()
        .map(into_core_input)
        .collect::<Result<Vec<_>, Status>>()?;
    let output = proto.output.map(into_core_output_schema).transpose()?;
    Ok(CoreRequest { inputs, output })
}

fn into_core_input(proto: proto::Input) -> Result<Input, Status> {
    Ok(Input {
        visualization: proto.visualization.map(into_core_visualization).transpose()?,
        data: proto.data.map(into_core_data_block).transpose()?,
    })
}

fn into_core_visualization(proto: proto::Visualization) -> Result<Visualization, Status> {
    let kind = proto
        .kind
        .ok_or_else(|| Status::invalid_argument("visualization oneof unset"))?;
    Ok(match kind {
        ProtoVisualizationKind::Grid(g) => Visualization::Grid {
            rows: g.rows,
            cols: g.cols,
        },
        ProtoVisualizationKind::MultiGrid(g) => Visualization::MultiGrid {
            rows: g.rows,
            cols: g.cols,
            channels: g.channels,
            channel_names: g.channel_names,
        },
        ProtoVisualizationKind::Scalar(s) => Visualization::Scalar {
            label: s.label,
            min: s.min,
            max: s.max,
            unit: s.unit,
        },
        ProtoVisualizationKind::Vector(v) => Visualization::Vector {
            label: v.label,
            max_magnitude: v.max_magnitude,
        },
        ProtoVisualizationKind::TimeSeries(t) => Visualization::TimeSeries {
            label: t.label,
            points: t.points,
            min_value: t.min_value,
            max_value: t.max_value,
        },
    })
}

fn into_core_data_block(proto: proto::DataBlock) -> Result<DataBlock, Status> {
    let kind = proto
        .kind
        .ok_or_else(|| Status::invalid_argument("data block oneof unset"))?;
    Ok(match kind {
        ProtoDataKind::Ints(v) => DataBlock::Ints { values: v.values },
        ProtoDataKind::Floats(v) => DataBlock::Floats { values: v.values },
    })
}

fn into_core_output_schema(proto: proto::OutputSchema) -> Result<OutputSchema, Status> {
    let kind = proto
        .kind
        .ok_or_else(|| Status::invalid_argument("output schema oneof unset"))?;
    Ok(match kind {
        ProtoOutputKind::OptionList(list) => OutputSchema::OptionList {
            options: list
                .options
                .into_iter()
                .map(|o| OutputOption {
                    label: o.label,
                    hotkey: o.hotkey,
                })
                .collect(),
        },
    })
}
